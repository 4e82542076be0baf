//! Width-independent access to the NT headers of Portable Executable images.
//!
//! The NT headers of PE32 and PE32+ images differ in the width of a handful of fields and in the
//! layout of the records derived from them. [`PeProperties`] offers one interface over both; the
//! concrete implementation is picked once, from the optional header magic, by
//! [`properties_from_nt_headers`].


mod error;
mod generic;
pub mod headers;
mod le_int;
pub mod load_config;
pub mod message_table;
mod properties;
mod select;
pub mod tls;
pub mod version_info;
pub mod width;


pub use crate::error::{Error, MalformedHeaderKind};
pub use crate::generic::{GenericProperties, Properties32, Properties64};
pub use crate::properties::{PeProperties, PeType};
pub use crate::select::{new_properties, properties_from_nt_headers};
