//! Stacked table construction.
//!
//! Every body row of the source becomes a miniature two-column table nested
//! in one cell of the outer stacked table:
//!
//! ```text
//! <table id="stacker-prices" class="stacker stacker-table">
//!   <tbody>
//!     <tr><td><table>
//!       <thead><tr><th>Plan</th><th>Basic</th></tr></thead>
//!       <tbody><tr><td>Cost</td><td>$5</td></tr></tbody>
//!     </table></td></tr>
//!   </tbody>
//! </table>
//! ```
//!
//! The first cell of a row is promoted into the mini-table's header; every
//! other cell becomes a label/value row. A cell whose column has no label is
//! rendered alone with `colspan="2"`.

use log::trace;

use crate::dom::{self, Handle};
use crate::markup::{Element, Node};
use crate::options::StackerOptions;
use crate::table::{Cell, Row, Table};

/// Class on both the source and the stacked table.
pub const STACKER_CLASS: &str = "stacker";
/// Class marking the source table.
pub const ORIGINAL_CLASS: &str = "stacker-original";
/// Class marking the stacked table.
pub const TABLE_CLASS: &str = "stacker-table";
/// Class on whichever of the pair is currently visible.
pub const ENABLED_CLASS: &str = "enabled";

/// Attribute pairing a source and stacked table for instance-scoped CSS.
pub const SCOPE_ATTRIBUTE: &str = "data-stacker-scope";

/// Prefix for the stacked table id.
pub const ID_PREFIX: &str = "stacker-";

/// The stacked rendition of one source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackedTable {
    element: Element,
    row_count: usize,
}

impl StackedTable {
    /// The outer `<table>` element.
    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Materialize the stacked table as a detached document node.
    pub fn to_node(&self) -> Handle {
        dom::from_markup(&self.element)
    }

    /// Number of mini-tables, one per stacked source row.
    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn id(&self) -> Option<&str> {
        self.element.get_attr("id")
    }

    pub fn to_html(&self) -> String {
        dom::outer_html(&self.to_node())
    }
}

/// Build the stacked table for `table`.
pub fn build(table: &Table, options: &StackerOptions) -> StackedTable {
    let mut outer = Element::new("table")
        .attr_opt("id", table.id.as_ref().map(|id| format!("{}{}", ID_PREFIX, id)))
        .class(STACKER_CLASS)
        .class(TABLE_CLASS)
        .class(&options.custom_class);

    if options.preserve_classes {
        if let Some(class) = &table.class {
            outer = outer.class(&preserved_table_class(class));
        }
    }

    if let Some(caption) = &table.caption {
        let mut element = Element::new("caption");
        if options.preserve_classes {
            element = element.attr_opt("class", caption.class.clone());
        }
        outer = outer.child(element.raw(caption.content.clone()));
    }

    let mut body = Element::new("tbody");
    for (index, row) in table.rows.iter().enumerate() {
        trace!("stacking row {} ({} cells)", index, row.len());
        let mini = build_row(table, row, options.preserve_classes);
        body = body.child(Element::new("tr").child(Element::new("td").child(mini)));
    }

    StackedTable {
        element: outer.child(body),
        row_count: table.rows.len(),
    }
}

/// The source table's own classes minus the ones stacking adds to it, so a
/// rebuilt table does not inherit `stacker-original`.
fn preserved_table_class(class: &str) -> String {
    class
        .split_whitespace()
        .filter(|c| ![STACKER_CLASS, ORIGINAL_CLASS, ENABLED_CLASS].contains(c))
        .collect::<Vec<_>>()
        .join(" ")
}

fn build_row(table: &Table, row: &Row, preserve_classes: bool) -> Element {
    let empty = Cell::new("");
    let first = row.cells.first().unwrap_or(&empty);

    let header = Element::new("tr").children(label_value_pair(
        "th",
        table.label(0),
        first,
        preserve_classes,
    ));

    let mut body = Element::new("tbody");
    for (column, cell) in row.cells.iter().enumerate().skip(1) {
        body = body.child(Element::new("tr").children(label_value_pair(
            "td",
            table.label(column),
            cell,
            preserve_classes,
        )));
    }

    Element::new("table")
        .child(Element::new("thead").child(header))
        .child(body)
}

/// Label cell (when the column has a label) followed by the value cell.
fn label_value_pair(
    tag: &str,
    label: Option<&str>,
    cell: &Cell,
    preserve_classes: bool,
) -> Vec<Node> {
    let class = if preserve_classes {
        cell.class.clone()
    } else {
        None
    };

    let mut nodes = Vec::with_capacity(2);
    let mut value = Element::new(tag);

    match label {
        Some(label) => {
            nodes.push(
                Element::new(tag)
                    .attr_opt("class", class.clone())
                    .raw(label)
                    .into(),
            );
        }
        None => value = value.attr("colspan", "2"),
    }

    nodes.push(value.attr_opt("class", class).raw(cell.content.clone()).into());
    nodes
}
