#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

mod compile;
pub mod index;
pub mod schema;

pub use index::PaperIndex;
