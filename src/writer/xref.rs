//! Cross-reference section generation for incremental updates.

use crate::types::ObjectId;

/// Formats one xref line (exactly 20 bytes including the trailing space
/// and newline).
fn xref_line(offset: u64, generation: u16, in_use: bool) -> String {
    format!(
        "{:010} {:05} {} \n",
        offset,
        generation,
        if in_use { 'n' } else { 'f' }
    )
}

/// Builds an incremental xref section for the given objects.
///
/// Unlike a full-file xref, an update section only lists the objects it
/// (re)defines, grouped into subsections of consecutive object numbers.
/// The head of the free list (object 0) is repeated so the section is
/// self-contained.
pub fn build_xref_section(entries: &[(ObjectId, u64)]) -> String {
    let mut sorted: Vec<&(ObjectId, u64)> = entries.iter().collect();
    sorted.sort_by_key(|(id, _)| id.number);

    let mut result = String::from("xref\n");
    result.push_str("0 1\n");
    result.push_str(&xref_line(0, 65535, false));

    let mut index = 0;
    while index < sorted.len() {
        // find the run of consecutive object numbers
        let mut end = index + 1;
        while end < sorted.len() && sorted[end].0.number == sorted[end - 1].0.number + 1 {
            end += 1;
        }
        result.push_str(&format!(
            "{} {}\n",
            sorted[index].0.number,
            end - index
        ));
        for (id, offset) in &sorted[index..end] {
            result.push_str(&xref_line(*offset, id.generation, true));
        }
        index = end;
    }

    result
}
