use std::fmt::Write as _;

use shared::protocol::StatRow;

use crate::html::escape;

/// A table column: the stat field it reads and the header it shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: String,
    pub label: String,
}

impl Column {
    /// Column headed by the uppercased field name.
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let label = key.to_uppercase();
        Self { key, label }
    }

    pub fn with_label(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
        }
    }

    /// Columns taken from the first row's fields, in payload order.
    ///
    /// Later rows are read by key, so a row missing a field gets an empty cell
    /// rather than shifting its remaining values.
    pub fn infer(rows: &[StatRow]) -> Vec<Column> {
        rows.first()
            .map(|row| row.keys().map(Column::new).collect())
            .unwrap_or_default()
    }

    /// Parses a comma separated list such as `player,kills,deaths`.
    pub fn parse_list(list: &str) -> Vec<Column> {
        list.split(',')
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(Column::new)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stripe {
    Even,
    Odd,
}

impl Stripe {
    pub fn for_index(index: usize) -> Self {
        if index % 2 == 0 {
            Stripe::Even
        } else {
            Stripe::Odd
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Stripe::Even => "row-even",
            Stripe::Odd => "row-odd",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRowView {
    pub cells: Vec<String>,
    pub stripe: Stripe,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableView {
    pub header: Vec<String>,
    pub rows: Vec<TableRowView>,
}

impl TableView {
    /// Lays out `rows` under `columns`. No rows means no header either.
    pub fn build(columns: &[Column], rows: &[StatRow]) -> Self {
        if rows.is_empty() {
            return Self::default();
        }

        let header = columns.iter().map(|column| column.label.clone()).collect();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, row)| TableRowView {
                cells: columns
                    .iter()
                    .map(|column| row.display(&column.key).unwrap_or_default())
                    .collect(),
                stripe: Stripe::for_index(index),
            })
            .collect();

        Self { header, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn render_html(&self) -> String {
        let mut out = String::from("<div class=\"stat-table\">\n<table>\n<thead>\n<tr>");
        for label in &self.header {
            let _ = write!(out, "<th>{}</th>", escape(label));
        }
        out.push_str("</tr>\n</thead>\n<tbody>\n");
        for row in &self.rows {
            let _ = write!(out, "<tr class=\"{}\">", row.stripe.css_class());
            for cell in &row.cells {
                let _ = write!(out, "<td>{}</td>", escape(cell));
            }
            out.push_str("</tr>\n");
        }
        out.push_str("</tbody>\n</table>\n</div>");
        out
    }

    /// Fixed-width text rendering for terminals.
    pub fn render_text(&self) -> String {
        if self.header.is_empty() {
            return String::new();
        }

        let mut widths: Vec<usize> = self.header.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(&row.cells) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let mut out = String::new();
        push_text_line(&mut out, &self.header, &widths);
        let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
        push_text_line(&mut out, &rule, &widths);
        for row in &self.rows {
            push_text_line(&mut out, &row.cells, &widths);
        }
        out
    }
}

fn push_text_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    out.push_str(line.join("  ").trim_end());
    out.push('\n');
}
