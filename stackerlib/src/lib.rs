//! # stackerlib
//!
//! Responsive data tables that keep their column headers.
//!
//! ## Overview
//!
//! Wide tables do not fit narrow viewports. Stacking rewrites every body row
//! of a table into a small two-column table of label/value pairs, where the
//! labels are the column headers, and inserts that stacked rendition right
//! after the original. A width condition (by default `max-width: 740px`)
//! decides which of the two is shown.
//!
//! - **Builder**: [`build`] turns a [`Table`] into a [`StackedTable`] using an
//!   explicit element tree, never string concatenation
//! - **Documents**: [`Document`] parses HTML with `html5ever`; [`Table::read`]
//!   reads any `<table>` element from it
//! - **Registry**: a [`Stacker`] remembers each source/stacked pair with its
//!   resolved [`StackerOptions`] until it is detached
//! - **Width observation**: a [`WidthObserver`] (for instance a [`Viewport`])
//!   toggles the `enabled` class as the width condition flips
//!
//! ## Example
//!
//! ```rust
//! use stackerlib::{dom, Document, Stacker, Viewport};
//!
//! let doc = Document::parse(
//!     r#"<table id="prices">
//!          <thead><tr><th>Plan</th><th>Cost</th></tr></thead>
//!          <tbody><tr><td>Basic</td><td>$5</td></tr></tbody>
//!        </table>"#,
//! );
//!
//! let viewport = Viewport::new(1024.0);
//! let mut stacker = Stacker::new().observe(viewport.clone());
//! stacker.build(&doc.tables(), None);
//!
//! let stacked = doc.find_by_id("stacker-prices").unwrap();
//! assert!(!dom::has_class(&stacked, "enabled"));
//!
//! viewport.resize(480.0);
//! assert!(dom::has_class(&stacked, "enabled"));
//! ```
//!
//! Tables can also be stacked without a document:
//!
//! ```rust
//! use stackerlib::{build, StackerOptions, Table};
//!
//! let table = Table::new()
//!     .header(["", "Cost"])
//!     .row(["Basic", "$5"]);
//! let stacked = build(&table, &StackerOptions::default());
//! assert!(stacked.to_html().contains(r#"<th colspan="2">Basic</th>"#));
//! ```

pub mod build;
pub mod dom;
pub mod error;
pub mod markup;
pub mod observer;
pub mod options;
pub mod stacker;
pub mod style;
pub mod table;

pub use build::{build, StackedTable};
pub use dom::{Document, Handle};
pub use error::StackerError;
pub use markup::{Element, Node};
pub use observer::{Listener, MediaQuery, SubscriptionId, Viewport, WidthObserver};
pub use options::{Length, LengthUnit, MaxWidth, OptionsOverride, StackerOptions};
pub use stacker::{Instance, InstanceId, Invocation, Method, Stacker};
pub use table::{Caption, Cell, Row, Table};

/// Result type for stackerlib operations
pub type Result<T> = std::result::Result<T, StackerError>;
