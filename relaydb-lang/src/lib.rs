mod name;
mod op;
mod path;
mod unit;

pub use name::{parse_name_alias, split_namespace};
pub use op::Op;
pub use path::{path_and_field, resolve_reference_path, Reference};
pub use unit::{arg_has_referer, map_has_referer, referer_param, remove_comments, Join, Unit};
