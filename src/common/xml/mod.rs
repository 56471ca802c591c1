//! XML text helpers shared by the cell writers and part serializers.

pub mod attr;
pub mod escape;

pub use attr::{push_attr, push_bool_attr, push_num_attr, push_opt_attr};
pub use escape::{escape_into, escape_xml, escaped_len};
