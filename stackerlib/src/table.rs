//! Source table model.
//!
//! A [`Table`] is the read-only view of a data table that the builder works
//! from: its id and class, an optional caption, one label per column and the
//! body rows. Cell contents and labels are markup fragments, kept exactly as
//! they appeared in the source.
//!
//! Tables come either from a parsed document ([`Table::read`]) or from the
//! builder methods, which is handy when the markup is generated elsewhere.

use crate::dom::{self, Handle};

/// The caption of a source table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    /// Inner markup of the caption
    pub content: String,
    /// Class attribute of the caption element
    pub class: Option<String>,
}

/// A single body cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// Inner markup of the cell
    pub content: String,
    /// Class attribute of the cell element
    pub class: Option<String>,
}

impl Cell {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            class: None,
        }
    }

    /// Builder: set the class attribute
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }
}

impl From<&str> for Cell {
    fn from(content: &str) -> Self {
        Cell::new(content)
    }
}

impl From<String> for Cell {
    fn from(content: String) -> Self {
        Cell::new(content)
    }
}

/// An ordered row of body cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
}

impl Row {
    pub fn new(cells: impl IntoIterator<Item = impl Into<Cell>>) -> Self {
        Self {
            cells: cells.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A data table to be stacked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    /// The `id` attribute, if any
    pub id: Option<String>,
    /// The `class` attribute, if any
    pub class: Option<String>,
    pub caption: Option<Caption>,
    /// Column labels, index-aligned with row cells
    pub labels: Vec<String>,
    /// Body rows to stack (a header row consumed for labels is not included)
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set the id
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Builder: set the class attribute
    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Builder: set the caption markup
    pub fn caption(mut self, content: impl Into<String>) -> Self {
        self.caption = Some(Caption {
            content: content.into(),
            class: None,
        });
        self
    }

    /// Builder: set the caption markup together with its class
    pub fn caption_with_class(
        mut self,
        content: impl Into<String>,
        class: impl Into<String>,
    ) -> Self {
        self.caption = Some(Caption {
            content: content.into(),
            class: Some(class.into()),
        });
        self
    }

    /// Builder: set the column labels
    pub fn header(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    /// Builder: append a body row
    pub fn row(mut self, cells: impl IntoIterator<Item = impl Into<Cell>>) -> Self {
        self.rows.push(Row::new(cells));
        self
    }

    /// The label for a column, or `None` when it is missing or blank.
    ///
    /// Columns without a label are rendered as a single cell spanning both
    /// columns of the stacked layout.
    pub fn label(&self, column: usize) -> Option<&str> {
        self.labels
            .get(column)
            .map(String::as_str)
            .filter(|label| !label.trim().is_empty())
    }

    /// Read a `<table>` element from a parsed document.
    ///
    /// Labels come from the last row of the `<thead>`: its `<th>` cells, or
    /// its `<td>` cells when it has no `<th>`. Without a `<thead>` the first
    /// body row supplies the labels and is left out of the stacked rows.
    ///
    /// Returns `None` when `handle` is not a table element.
    pub fn read(handle: &Handle) -> Option<Self> {
        if !dom::is_table(handle) {
            return None;
        }

        let sections = dom::child_elements(handle);

        let caption = sections
            .iter()
            .find(|child| dom::is_element(child, "caption"))
            .map(|caption| Caption {
                content: dom::inner_html(caption),
                class: dom::attr(caption, "class"),
            });

        let mut body_rows: Vec<Handle> = sections
            .iter()
            .filter(|child| dom::is_element(child, "tbody"))
            .flat_map(|body| dom::child_elements_named(body, "tr"))
            .collect();

        let thead = sections
            .iter()
            .find(|child| dom::is_element(child, "thead"));

        let labels = match thead {
            Some(thead) => {
                let header_row = dom::child_elements_named(thead, "tr")
                    .into_iter()
                    .rev()
                    .find(|row| !dom::child_elements(row).is_empty());
                match header_row {
                    Some(row) => {
                        let headings = dom::child_elements_named(&row, "th");
                        let label_cells = if headings.is_empty() {
                            dom::child_elements_named(&row, "td")
                        } else {
                            headings
                        };
                        label_cells.iter().map(dom::inner_html).collect()
                    }
                    None => Vec::new(),
                }
            }
            None if !body_rows.is_empty() => {
                let first = body_rows.remove(0);
                read_cells(&first)
                    .into_iter()
                    .map(|cell| cell.content)
                    .collect()
            }
            None => Vec::new(),
        };

        let rows = body_rows
            .iter()
            .map(|row| Row {
                cells: read_cells(row),
            })
            .collect();

        Some(Table {
            id: dom::attr(handle, "id").filter(|id| !id.is_empty()),
            class: dom::attr(handle, "class"),
            caption,
            labels,
            rows,
        })
    }
}

/// Direct `<td>`/`<th>` children of a row, in order.
fn read_cells(row: &Handle) -> Vec<Cell> {
    dom::child_elements(row)
        .iter()
        .filter(|cell| dom::is_element(cell, "td") || dom::is_element(cell, "th"))
        .map(|cell| Cell {
            content: dom::inner_html(cell),
            class: dom::attr(cell, "class"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;

    fn first_table(html: &str) -> Table {
        let doc = Document::parse(html);
        let handle = doc.tables().into_iter().next().expect("no table in fixture");
        Table::read(&handle).expect("not a table")
    }

    #[test]
    fn test_builder() {
        let table = Table::new()
            .id("prices")
            .header(["Plan", "Cost"])
            .row(["Basic", "$5"])
            .row(vec![Cell::new("Pro"), Cell::new("$9").class("hot")]);
        assert_eq!(table.id.as_deref(), Some("prices"));
        assert_eq!(table.labels, vec!["Plan", "Cost"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[1].cells[1].class.as_deref(), Some("hot"));
    }

    #[test]
    fn test_label_lookup() {
        let table = Table::new().header(["", "Cost", "  "]);
        assert_eq!(table.label(0), None);
        assert_eq!(table.label(1), Some("Cost"));
        assert_eq!(table.label(2), None);
        assert_eq!(table.label(9), None);
    }

    #[test]
    fn test_read_with_thead() {
        let table = first_table(
            r#"<table id="prices" class="data">
                 <caption class="cap">Monthly <b>plans</b></caption>
                 <thead><tr><th>Plan</th><th>Cost</th></tr></thead>
                 <tbody>
                   <tr><td>Basic</td><td class="money">$5</td></tr>
                   <tr><td>Pro</td><td><em>$9</em></td></tr>
                 </tbody>
               </table>"#,
        );
        assert_eq!(table.id.as_deref(), Some("prices"));
        assert_eq!(table.class.as_deref(), Some("data"));
        let caption = table.caption.as_ref().unwrap();
        assert_eq!(caption.content, "Monthly <b>plans</b>");
        assert_eq!(caption.class.as_deref(), Some("cap"));
        assert_eq!(table.labels, vec!["Plan", "Cost"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells[1].class.as_deref(), Some("money"));
        assert_eq!(table.rows[1].cells[1].content, "<em>$9</em>");
    }

    #[test]
    fn test_read_thead_with_td_labels() {
        let table = first_table(
            "<table><thead><tr><td>Name</td><td>Age</td></tr></thead>\
             <tbody><tr><td>Ann</td><td>31</td></tr></tbody></table>",
        );
        assert_eq!(table.labels, vec!["Name", "Age"]);
        assert_eq!(table.rows.len(), 1);
    }

    #[test]
    fn test_read_without_thead_consumes_first_row() {
        let table = first_table(
            "<table><tr><td>Name</td><td>Age</td></tr>\
             <tr><td>Ann</td><td>31</td></tr><tr><td>Bob</td><td>42</td></tr></table>",
        );
        assert_eq!(table.labels, vec!["Name", "Age"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].cells[0].content, "Ann");
    }

    #[test]
    fn test_read_rows_across_multiple_bodies() {
        let table = first_table(
            "<table><thead><tr><th>A</th></tr></thead>\
             <tbody><tr><td>1</td></tr></tbody><tbody><tr><td>2</td></tr></tbody>\
             <tfoot><tr><td>sum</td></tr></tfoot></table>",
        );
        let values: Vec<_> = table
            .rows
            .iter()
            .map(|row| row.cells[0].content.as_str())
            .collect();
        assert_eq!(values, vec!["1", "2"]);
    }

    #[test]
    fn test_read_ignores_nested_table_cells() {
        let table = first_table(
            "<table><thead><tr><th>Outer</th></tr></thead><tbody>\
             <tr><td><table><tr><td>inner</td></tr></table></td></tr>\
             </tbody></table>",
        );
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].cells.len(), 1);
        assert!(table.rows[0].cells[0].content.contains("inner"));
    }

    #[test]
    fn test_read_rejects_non_table() {
        let doc = Document::parse("<div id=\"x\"></div>");
        let div = doc.find_by_id("x").unwrap();
        assert!(Table::read(&div).is_none());
    }
}
