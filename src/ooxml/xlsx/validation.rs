//! Data validation rules.
//!
//! A rule is checked completely when it is built. Serializing it later cannot
//! fail and produces one `<dataValidation>` element.

use crate::common::error::{Error, Result};
use crate::common::reference::CellRange;
use crate::common::unit::datetime_to_oa_date;
use crate::common::xml::{push_attr, push_opt_attr};
use crate::ooxml::xlsx::formula::{Formula, push_string_literal};
use crate::ooxml::xlsx::writer::styles::trim_float;
use chrono::NaiveDateTime;

/// Longest input or error title.
pub const MAX_TITLE_LENGTH: usize = 32;
/// Longest input or error message.
pub const MAX_MESSAGE_LENGTH: usize = 255;
/// Longest joined value list, including the separating commas.
pub const MAX_LIST_LENGTH: usize = 255;
/// Most validations a worksheet can hold.
pub const MAX_VALIDATIONS_PER_WORKSHEET: usize = 65_534;

/// A comparison with its operands.
///
/// The variant fixes how many operands there are, so a rule can never carry
/// a second operand that its operator ignores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ValidationCondition<T> {
    Between(T, T),
    NotBetween(T, T),
    EqualTo(T),
    NotEqualTo(T),
    GreaterThan(T),
    GreaterThanOrEqualTo(T),
    LessThan(T),
    LessThanOrEqualTo(T),
}

impl<T> ValidationCondition<T> {
    fn operator(&self) -> &'static str {
        match self {
            Self::Between(..) => "between",
            Self::NotBetween(..) => "notBetween",
            Self::EqualTo(_) => "equal",
            Self::NotEqualTo(_) => "notEqual",
            Self::GreaterThan(_) => "greaterThan",
            Self::GreaterThanOrEqualTo(_) => "greaterThanOrEqual",
            Self::LessThan(_) => "lessThan",
            Self::LessThanOrEqualTo(_) => "lessThanOrEqual",
        }
    }

    fn operands(&self) -> (&T, Option<&T>) {
        match self {
            Self::Between(a, b) | Self::NotBetween(a, b) => (a, Some(b)),
            Self::EqualTo(a)
            | Self::NotEqualTo(a)
            | Self::GreaterThan(a)
            | Self::GreaterThanOrEqualTo(a)
            | Self::LessThan(a)
            | Self::LessThanOrEqualTo(a) => (a, None),
        }
    }
}

impl<T: PartialOrd> ValidationCondition<T> {
    fn check_range(&self) -> Result<()> {
        if let (min, Some(max)) = self.operands()
            && !(min <= max)
        {
            return Err(Error::invalid_argument(
                "Minimum operand must not be greater than the maximum",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DataValidationType {
    Whole,
    Decimal,
    Date,
    TextLength,
    List,
    Custom,
}

impl DataValidationType {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Whole => "whole",
            Self::Decimal => "decimal",
            Self::Date => "date",
            Self::TextLength => "textLength",
            Self::List => "list",
            Self::Custom => "custom",
        }
    }
}

/// How a reader reacts to a value that breaks the rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ValidationErrorStyle {
    #[default]
    Stop,
    Warning,
    Information,
}

impl ValidationErrorStyle {
    fn as_str(&self) -> Option<&'static str> {
        match self {
            Self::Stop => None,
            Self::Warning => Some("warning"),
            Self::Information => Some("information"),
        }
    }
}

/// A data validation rule.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    validation_type: DataValidationType,
    operator: Option<&'static str>,
    formula1: String,
    formula2: Option<String>,
    show_dropdown: bool,
    pub ignore_blank: bool,
    pub error_style: ValidationErrorStyle,
    input_title: Option<String>,
    input_message: Option<String>,
    error_title: Option<String>,
    error_message: Option<String>,
}

impl DataValidation {
    fn with_condition<T: PartialOrd>(
        validation_type: DataValidationType,
        condition: ValidationCondition<T>,
        render: impl Fn(&T) -> String,
    ) -> Result<Self> {
        condition.check_range()?;
        let (first, second) = condition.operands();
        Ok(Self::from_formulas(
            validation_type,
            Some(condition.operator()),
            render(first),
            second.map(render),
        ))
    }

    fn from_formulas(
        validation_type: DataValidationType,
        operator: Option<&'static str>,
        formula1: String,
        formula2: Option<String>,
    ) -> Self {
        Self {
            validation_type,
            // `between` is the implied operator
            operator: operator.filter(|op| *op != "between"),
            formula1,
            formula2,
            show_dropdown: true,
            ignore_blank: true,
            error_style: ValidationErrorStyle::Stop,
            input_title: None,
            input_message: None,
            error_title: None,
            error_message: None,
        }
    }

    /// Whole numbers.
    pub fn whole(condition: ValidationCondition<i64>) -> Result<Self> {
        Self::with_condition(DataValidationType::Whole, condition, |v| {
            itoa::Buffer::new().format(*v).to_string()
        })
    }

    /// Decimal numbers. Operands must be finite.
    pub fn decimal(condition: ValidationCondition<f64>) -> Result<Self> {
        let (first, second) = condition.operands();
        if !first.is_finite() || second.is_some_and(|v| !v.is_finite()) {
            return Err(Error::invalid_argument("Decimal operands must be finite"));
        }
        Self::with_condition(DataValidationType::Decimal, condition, |v| format_f64(*v))
    }

    /// Dates and times.
    pub fn date(condition: ValidationCondition<NaiveDateTime>) -> Result<Self> {
        Self::with_condition(DataValidationType::Date, condition, |v| {
            format_f64(datetime_to_oa_date(*v))
        })
    }

    /// Length of the entered text.
    pub fn text_length(condition: ValidationCondition<u32>) -> Result<Self> {
        Self::with_condition(DataValidationType::TextLength, condition, |v| {
            itoa::Buffer::new().format(*v).to_string()
        })
    }

    /// One of a fixed set of values.
    ///
    /// Values cannot contain commas, and together with their separators they
    /// must fit in 255 characters.
    pub fn list_values<I, S>(values: I, show_dropdown: bool) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut joined = String::new();
        let mut joined_len = 0;
        for (i, value) in values.into_iter().enumerate() {
            let value = value.as_ref();
            if value.contains(',') {
                return Err(Error::invalid_argument(format!(
                    "List value '{}' cannot contain a comma",
                    value
                )));
            }
            if i > 0 {
                joined.push(',');
                joined_len += 1;
            }
            joined.push_str(value);
            joined_len += value.chars().count();
        }

        if joined.is_empty() {
            return Err(Error::invalid_argument("List validation needs at least one value"));
        }
        if joined_len > MAX_LIST_LENGTH {
            return Err(Error::invalid_argument(format!(
                "List values cannot be longer than {} characters in total",
                MAX_LIST_LENGTH
            )));
        }

        let mut formula = String::with_capacity(joined.len() + 2);
        push_string_literal(&mut formula, &joined);
        let mut rule = Self::from_formulas(DataValidationType::List, None, formula, None);
        rule.show_dropdown = show_dropdown;
        Ok(rule)
    }

    /// One of the values in a range of the same worksheet.
    pub fn list_from_cells(range: CellRange, show_dropdown: bool) -> Self {
        let mut rule = Self::from_formulas(
            DataValidationType::List,
            None,
            absolute_range(&range),
            None,
        );
        rule.show_dropdown = show_dropdown;
        rule
    }

    /// One of the values in a range of another worksheet.
    pub fn list_from_worksheet_cells(
        worksheet_name: &str,
        range: CellRange,
        show_dropdown: bool,
    ) -> Self {
        let mut formula = String::with_capacity(worksheet_name.len() + 24);
        formula.push('\'');
        formula.push_str(&worksheet_name.replace('\'', "''"));
        formula.push_str("'!");
        formula.push_str(&absolute_range(&range));

        let mut rule = Self::from_formulas(DataValidationType::List, None, formula, None);
        rule.show_dropdown = show_dropdown;
        rule
    }

    /// Any formula that evaluates to true for valid input.
    pub fn custom(formula: &Formula) -> Self {
        Self::from_formulas(
            DataValidationType::Custom,
            None,
            formula.text().to_string(),
            None,
        )
    }

    /// Message shown while a validated cell is selected.
    pub fn with_input_message(mut self, title: Option<&str>, message: &str) -> Result<Self> {
        check_length("Input title", title, MAX_TITLE_LENGTH)?;
        check_length("Input message", Some(message), MAX_MESSAGE_LENGTH)?;
        self.input_title = title.map(str::to_string);
        self.input_message = Some(message.to_string());
        Ok(self)
    }

    /// Message shown when invalid data is entered.
    pub fn with_error_message(mut self, title: Option<&str>, message: &str) -> Result<Self> {
        check_length("Error title", title, MAX_TITLE_LENGTH)?;
        check_length("Error message", Some(message), MAX_MESSAGE_LENGTH)?;
        self.error_title = title.map(str::to_string);
        self.error_message = Some(message.to_string());
        Ok(self)
    }

    pub fn with_error_style(mut self, error_style: ValidationErrorStyle) -> Self {
        self.error_style = error_style;
        self
    }

    pub fn with_ignore_blank(mut self, ignore_blank: bool) -> Self {
        self.ignore_blank = ignore_blank;
        self
    }

    /// Append the `<dataValidation>` element for the cells in `ranges`.
    pub(crate) fn write_xml(&self, xml: &mut String, ranges: &[CellRange]) {
        xml.push_str("<dataValidation");
        push_attr(xml, "type", self.validation_type.as_str());
        push_opt_attr(xml, "errorStyle", self.error_style.as_str());
        push_opt_attr(xml, "operator", self.operator);
        if self.ignore_blank {
            xml.push_str(r#" allowBlank="1""#);
        }
        // The attribute suppresses the in-cell dropdown
        if self.validation_type == DataValidationType::List && !self.show_dropdown {
            xml.push_str(r#" showDropDown="1""#);
        }
        if self.input_message.is_some() {
            xml.push_str(r#" showInputMessage="1""#);
        }
        xml.push_str(r#" showErrorMessage="1""#);
        push_opt_attr(xml, "errorTitle", self.error_title.as_deref());
        push_opt_attr(xml, "error", self.error_message.as_deref());
        push_opt_attr(xml, "promptTitle", self.input_title.as_deref());
        push_opt_attr(xml, "prompt", self.input_message.as_deref());

        let sqref = ranges
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        push_attr(xml, "sqref", &sqref);
        xml.push('>');

        push_formula_element(xml, "formula1", &self.formula1);
        if let Some(ref formula2) = self.formula2 {
            push_formula_element(xml, "formula2", formula2);
        }

        xml.push_str("</dataValidation>");
    }
}

fn push_formula_element(xml: &mut String, name: &str, formula: &str) {
    xml.push('<');
    xml.push_str(name);
    xml.push('>');
    xml.push_str(&crate::common::xml::escape_xml(formula));
    xml.push_str("</");
    xml.push_str(name);
    xml.push('>');
}

fn check_length(what: &str, value: Option<&str>, max: usize) -> Result<()> {
    match value {
        Some(value) if value.chars().count() > max => Err(Error::invalid_argument(format!(
            "{} cannot be longer than {} characters",
            what, max
        ))),
        _ => Ok(()),
    }
}

fn format_f64(v: f64) -> String {
    trim_float(ryu::Buffer::new().format(v)).to_string()
}

fn absolute_range(range: &CellRange) -> String {
    use crate::common::reference::column_to_letters;

    let mut out = format!(
        "${}${}",
        column_to_letters(range.first.column),
        range.first.row
    );
    if range.first != range.last {
        out.push_str(&format!(
            ":${}${}",
            column_to_letters(range.last.column),
            range.last.row
        ));
    }
    out
}
