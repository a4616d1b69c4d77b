//! Presentation for the admin client: stat tables and the disputes page.
//!
//! Every renderer produces a plain view model first; HTML and terminal text are
//! derived from the view model so both outputs agree on content.

pub mod disputes;
pub mod html;
pub mod table;

pub use disputes::{DisputeCard, DisputesPage, ImagePolicy};
pub use table::{Column, Stripe, TableRowView, TableView};
