//! Companion stylesheets.
//!
//! Stacking only rewrites markup; which table is visible is decided by CSS.
//! Two conventions are supported:
//!
//! - [`stylesheet`]: visibility follows the `enabled` class that a
//!   [`Stacker`](crate::Stacker) toggles from its width observer.
//! - [`responsive_stylesheet`]: a media query does the swap by itself, for
//!   documents that are served without anything observing the viewport.
//!   [`instance_stylesheet`] extends it with one scoped block per distinct
//!   per-table `maxWidth`.

use crate::build::{ENABLED_CLASS, ORIGINAL_CLASS, SCOPE_ATTRIBUTE, TABLE_CLASS};
use crate::dom::{self, Document};
use crate::markup::Element;
use crate::observer::MediaQuery;
use crate::options::MaxWidth;
use crate::stacker::Stacker;

/// CSS showing whichever table of a pair carries the `enabled` class.
pub fn stylesheet() -> String {
    format!(
        ".{original}, .{table} {{ display: none; }}\n\
         .{original}.{enabled}, .{table}.{enabled} {{ display: table; }}\n\
         .{table} table {{ width: 100%; }}\n",
        original = ORIGINAL_CLASS,
        table = TABLE_CLASS,
        enabled = ENABLED_CLASS,
    )
}

/// CSS swapping the tables at `max_width` with a media query.
pub fn responsive_stylesheet(max_width: &MaxWidth) -> String {
    let swap = format!(
        ".{original} {{ display: none; }}\n.{table} {{ display: table; }}\n",
        original = ORIGINAL_CLASS,
        table = TABLE_CLASS,
    );
    format!(
        ".{table} {{ display: none; }}\n.{table} table {{ width: 100%; }}\n{swap}",
        table = TABLE_CLASS,
        swap = media_block(max_width, &swap),
    )
}

/// [`responsive_stylesheet`] for `default`, plus a block for every group of
/// instances whose own `maxWidth` differs from it.
///
/// Both tables of such an instance are tagged with a `data-stacker-scope`
/// attribute so the scoped rules outrank the class-only ones.
pub fn instance_stylesheet(stacker: &Stacker, default: &MaxWidth) -> String {
    let mut groups: Vec<(MaxWidth, Vec<String>)> = Vec::new();
    for instance in stacker.instances() {
        let max_width = instance.options().max_width;
        if max_width == *default {
            continue;
        }
        let scope = instance.id().to_string();
        dom::set_attr(instance.source(), SCOPE_ATTRIBUTE, &scope);
        dom::set_attr(instance.stacked(), SCOPE_ATTRIBUTE, &scope);
        match groups.iter_mut().find(|(width, _)| *width == max_width) {
            Some((_, scopes)) => scopes.push(scope),
            None => groups.push((max_width, vec![scope])),
        }
    }

    let mut css = responsive_stylesheet(default);
    for (max_width, scopes) in &groups {
        let originals = scoped_selector(scopes, ORIGINAL_CLASS);
        let tables = scoped_selector(scopes, TABLE_CLASS);
        css.push_str(&format!(
            "{originals} {{ display: table; }}\n{tables} {{ display: none; }}\n"
        ));
        let swap = format!("{originals} {{ display: none; }}\n{tables} {{ display: table; }}\n");
        css.push_str(&media_block(max_width, &swap));
    }
    css
}

fn scoped_selector(scopes: &[String], class: &str) -> String {
    scopes
        .iter()
        .map(|scope| format!("[{}=\"{}\"].{}", SCOPE_ATTRIBUTE, scope, class))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Wrap `css` in a max-width media query; unbounded widths always apply.
fn media_block(max_width: &MaxWidth, css: &str) -> String {
    match max_width {
        MaxWidth::Length(_) => format!(
            "@media {} {{\n{}}}\n",
            MediaQuery::max_width(*max_width),
            indent(css)
        ),
        MaxWidth::Unbounded => css.to_string(),
    }
}

fn indent(css: &str) -> String {
    css.lines().map(|line| format!("  {}\n", line)).collect()
}

/// Append a `<style>` element holding `css` to the document head.
///
/// Returns `false` when the document has no head.
pub fn inject(doc: &Document, css: &str) -> bool {
    let Some(head) = doc.head() else {
        return false;
    };
    let style = Element::new("style").text(css);
    dom::append(&head, dom::from_markup(&style));
    true
}
