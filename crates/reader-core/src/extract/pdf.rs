//! PDF text-item walking: geometry-gap paragraph breaks, end-of-line
//! hyphenation joins, and bookmark-derived heading insertion.

use crate::ReaderError;
use lopdf::{Document, Object};

struct TextItem {
    text: String,
    y: f32,
    height: f32,
}

/// Walks a page's content stream, tracking the text cursor's vertical
/// position and the active font size, and collects one [`TextItem`] per
/// text-showing operator in document order.
fn page_text_items(doc: &Document, page_id: (u32, u16)) -> Vec<TextItem> {
    let Ok(content_bytes) = doc.get_page_content(page_id) else {
        return Vec::new();
    };
    let Ok(content) = lopdf::content::Content::decode(&content_bytes) else {
        return Vec::new();
    };

    let mut items = Vec::new();
    let mut current_y: f32 = 0.0;
    let mut current_height: f32 = 10.0;

    for op in content.operations {
        match op.operator.as_str() {
            "Tf" => {
                if let Some(Object::Real(size)) = op.operands.get(1) {
                    current_height = *size as f32;
                } else if let Some(Object::Integer(size)) = op.operands.get(1) {
                    current_height = *size as f32;
                }
            }
            "Td" | "TD" => {
                if let Some(ty) = op.operands.get(1).and_then(object_as_f32) {
                    current_y += ty;
                }
            }
            "Tm" => {
                if let Some(ty) = op.operands.get(5).and_then(object_as_f32) {
                    current_y = ty;
                }
            }
            "Tj" => {
                if let Some(Object::String(bytes, _)) = op.operands.first() {
                    push_text(&mut items, bytes, current_y, current_height);
                }
            }
            "TJ" => {
                if let Some(Object::Array(parts)) = op.operands.first() {
                    let mut joined = Vec::new();
                    for part in parts {
                        if let Object::String(bytes, _) = part {
                            joined.extend_from_slice(bytes);
                        }
                    }
                    push_text(&mut items, &joined, current_y, current_height);
                }
            }
            _ => {}
        }
    }
    items
}

fn object_as_f32(obj: &Object) -> Option<f32> {
    match obj {
        Object::Real(r) => Some(*r as f32),
        Object::Integer(i) => Some(*i as f32),
        _ => None,
    }
}

fn push_text(items: &mut Vec<TextItem>, bytes: &[u8], y: f32, height: f32) {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    if !text.is_empty() {
        items.push(TextItem { text, y, height });
    }
}

/// Groups a page's items into paragraphs: a new paragraph starts whenever
/// the vertical gap to the previous item exceeds `1.8 * 1.5 * lastHeight`.
fn group_into_paragraphs(items: &[TextItem]) -> Vec<String> {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut last_height = 10.0_f32;
    let mut last_y: Option<f32> = None;

    for item in items {
        let gap_exceeded = match last_y {
            Some(prev_y) => (prev_y - item.y).abs() > 1.8 * 1.5 * last_height,
            None => false,
        };

        if gap_exceeded && !current.is_empty() {
            paragraphs.push(std::mem::take(&mut current));
        }

        if current.ends_with('-') {
            current.pop();
            current.push_str(&item.text);
        } else if current.is_empty() {
            current.push_str(&item.text);
        } else {
            current.push(' ');
            current.push_str(&item.text);
        }

        last_height = item.height;
        last_y = Some(item.y);
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }
    paragraphs
}

struct Bookmark {
    title: String,
    page_index: usize,
    level: u8,
}

/// Best-effort bookmark outline walk: `/Root/Outlines` → `/First`/`/Next`
/// chain, resolving each entry's destination page via the page object map.
fn extract_bookmarks(doc: &Document) -> Vec<Bookmark> {
    let mut bookmarks = Vec::new();
    let Ok(catalog) = doc.catalog() else {
        return bookmarks;
    };
    let Ok(outlines_ref) = catalog.get(b"Outlines") else {
        return bookmarks;
    };
    let Ok(outlines) = doc.get_dictionary(outlines_ref.as_reference().unwrap_or_default()) else {
        return bookmarks;
    };

    let pages = doc.get_pages();
    let page_index_of = |obj_id: lopdf::ObjectId| -> Option<usize> {
        pages
            .iter()
            .position(|(_, &id)| id == obj_id)
    };

    let mut stack: Vec<(lopdf::ObjectId, u8)> = Vec::new();
    if let Ok(first) = outlines.get(b"First").and_then(|o| o.as_reference()) {
        stack.push((first, 1));
    }

    while let Some((obj_id, level)) = stack.pop() {
        let Ok(dict) = doc.get_dictionary(obj_id) else {
            continue;
        };
        if let Ok(next) = dict.get(b"Next").and_then(|o| o.as_reference()) {
            stack.push((next, level));
        }
        if let Ok(first) = dict.get(b"First").and_then(|o| o.as_reference()) {
            stack.push((first, level + 1));
        }

        let title = dict
            .get(b"Title")
            .ok()
            .and_then(|o| o.as_str().ok())
            .map(|b| String::from_utf8_lossy(b).to_string())
            .unwrap_or_default();

        let dest_page = dict
            .get(b"Dest")
            .and_then(|o| o.as_array())
            .ok()
            .and_then(|arr| arr.first())
            .and_then(|o| o.as_reference().ok())
            .and_then(page_index_of);

        if !title.is_empty() {
            if let Some(page_index) = dest_page {
                bookmarks.push(Bookmark { title, page_index, level });
            }
        }
    }
    bookmarks
}

/// Extracts paragraphs from PDF bytes per §4.1's PDF mode: per-page
/// geometry grouping, re-running the sentence-group fallback if the whole
/// document still yields at most one paragraph, then inserting
/// heading-styled pseudo-paragraphs derived from the bookmark tree.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ReaderError> {
    let doc = Document::load_mem(bytes).map_err(|_| ReaderError::UnsupportedFile)?;

    let mut paragraphs: Vec<String> = Vec::new();
    let mut page_start_index: Vec<usize> = Vec::new();

    for (_page_num, page_id) in doc.get_pages() {
        page_start_index.push(paragraphs.len());
        let items = page_text_items(&doc, page_id);
        paragraphs.extend(group_into_paragraphs(&items));
    }

    if paragraphs.len() <= 1 {
        let joined = paragraphs.join(" ");
        paragraphs = crate::normaliser::sentence_group_fallback(&joined);
    }

    let bookmarks = extract_bookmarks(&doc);
    for bookmark in bookmarks.into_iter().rev() {
        let Some(&insert_at) = page_start_index.get(bookmark.page_index) else {
            continue;
        };
        let level = bookmark.level.clamp(2, 4);
        let heading = format!("{} {}", "#".repeat(level as usize), bookmark.title);
        let insert_at = insert_at.min(paragraphs.len());
        paragraphs.insert(insert_at, heading);
    }

    Ok(paragraphs
        .into_iter()
        .filter(|p| !p.trim().is_empty())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_into_paragraphs_breaks_on_large_vertical_gap() {
        let items = vec![
            TextItem { text: "Line one of paragraph one.".into(), y: 700.0, height: 10.0 },
            TextItem { text: "Line two of paragraph one.".into(), y: 688.0, height: 10.0 },
            TextItem { text: "New paragraph after a big gap.".into(), y: 600.0, height: 10.0 },
        ];
        let paras = group_into_paragraphs(&items);
        assert_eq!(paras.len(), 2);
    }

    #[test]
    fn group_into_paragraphs_joins_hyphenated_line_breaks() {
        let items = vec![
            TextItem { text: "contin-".into(), y: 700.0, height: 10.0 },
            TextItem { text: "uation".into(), y: 688.0, height: 10.0 },
        ];
        let paras = group_into_paragraphs(&items);
        assert_eq!(paras, vec!["continuation".to_string()]);
    }
}
