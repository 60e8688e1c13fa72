//! Unrolling repeat marks into a linear element stream.

use crate::ast::{Bar, Element};

/// Expand `|: .. :|` sections so the section plays twice.
///
/// A first ending (`|1`) is played on the first pass and skipped on the
/// repeat. A section with no `|:` repeats from the start of the tune or
/// from the previous repeat end. Repeat marks become plain bar lines.
pub fn expand_repeats(elements: &[Element]) -> Vec<Element> {
    let mut out = Vec::with_capacity(elements.len());
    let mut section_start = 0;
    let mut first_ending_at: Option<usize> = None;

    for element in elements {
        match element {
            Element::Bar(Bar::RepeatStart) => {
                out.push(Element::Bar(Bar::Single));
                section_start = out.len();
                first_ending_at = None;
            }
            Element::Bar(Bar::Ending(1)) => {
                out.push(Element::Bar(Bar::Single));
                first_ending_at = Some(out.len());
            }
            Element::Bar(Bar::Ending(_)) => out.push(Element::Bar(Bar::Single)),
            Element::Bar(Bar::RepeatEnd | Bar::RepeatEndEnding(_) | Bar::RepeatBoth) => {
                out.push(Element::Bar(Bar::Single));
                let end = first_ending_at.unwrap_or(out.len());
                let replay = out[section_start..end].to_vec();
                out.extend(replay);
                section_start = out.len();
                first_ending_at = None;
            }
            other => out.push(other.clone()),
        }
    }

    out
}
