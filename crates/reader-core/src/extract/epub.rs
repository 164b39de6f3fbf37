//! EPUB/ZIP container parsing: `container.xml` → OPF spine → each content
//! document's blocks, in reading order, reusing the HTML block extractor.

use crate::extract::html;
use crate::extract::EPUB_DECOMPRESSED_CAP;
use crate::normaliser::paragraphs_from_markdown;
use crate::ReaderError;
use std::io::Read;

/// Reads the rootfile path out of `META-INF/container.xml`.
fn rootfile_path(container_xml: &str) -> Option<String> {
    let marker = "full-path=\"";
    let start = container_xml.find(marker)? + marker.len();
    let end = container_xml[start..].find('"')? + start;
    Some(container_xml[start..end].to_string())
}

/// A manifest entry: id -> href, restricted to XHTML content documents.
struct ManifestEntry {
    id: String,
    href: String,
}

fn parse_manifest(opf: &str) -> Vec<ManifestEntry> {
    let mut entries = Vec::new();
    for item_tag in opf.split("<item ").skip(1) {
        let tag_end = item_tag.find('>').unwrap_or(item_tag.len());
        let attrs = &item_tag[..tag_end];
        let is_xhtml = attrs.contains("application/xhtml+xml") || attrs.contains("text/html");
        if !is_xhtml {
            continue;
        }
        let Some(id) = attr_value(attrs, "id") else { continue };
        let Some(href) = attr_value(attrs, "href") else { continue };
        entries.push(ManifestEntry { id, href });
    }
    entries
}

/// Reading order: `<spine>` lists `<itemref idref="...">` entries pointing
/// back into the manifest by id.
fn parse_spine_order(opf: &str) -> Vec<String> {
    let Some(spine_start) = opf.find("<spine") else { return Vec::new() };
    let Some(spine_end) = opf[spine_start..].find("</spine>") else { return Vec::new() };
    let spine_body = &opf[spine_start..spine_start + spine_end];

    spine_body
        .split("<itemref ")
        .skip(1)
        .filter_map(|tag| {
            let tag_end = tag.find('>').unwrap_or(tag.len());
            attr_value(&tag[..tag_end], "idref")
        })
        .collect()
}

fn attr_value(attrs: &str, name: &str) -> Option<String> {
    let marker = format!("{name}=\"");
    let start = attrs.find(&marker)? + marker.len();
    let end = attrs[start..].find('"')? + start;
    Some(attrs[start..end].to_string())
}

fn opf_dir(opf_path: &str) -> String {
    match opf_path.rfind('/') {
        Some(idx) => opf_path[..=idx].to_string(),
        None => String::new(),
    }
}

/// Extracts paragraphs from an EPUB archive: parse the container and OPF to
/// find the spine reading order, then run every content document through the
/// HTML block extractor, preserving heading levels across the whole book.
pub fn extract_paragraphs(bytes: &[u8]) -> Result<Vec<String>, ReaderError> {
    let cursor = std::io::Cursor::new(bytes);
    let mut archive = zip::ZipArchive::new(cursor).map_err(|_| ReaderError::UnsupportedFile)?;

    let container_xml = read_zip_entry(&mut archive, "META-INF/container.xml")?;
    let opf_path = rootfile_path(&container_xml).ok_or(ReaderError::UnsupportedFile)?;
    let opf = read_zip_entry(&mut archive, &opf_path)?;
    let base_dir = opf_dir(&opf_path);

    let manifest = parse_manifest(&opf);
    let spine = parse_spine_order(&opf);

    let mut total_bytes: usize = 0;
    let mut all_blocks: Vec<html::Block> = Vec::new();

    for idref in &spine {
        let Some(entry) = manifest.iter().find(|e| &e.id == idref) else {
            continue;
        };
        let path = format!("{base_dir}{}", entry.href);
        let Ok(content) = read_zip_entry(&mut archive, &path) else {
            continue;
        };
        total_bytes += content.len();
        if total_bytes > EPUB_DECOMPRESSED_CAP {
            return Err(ReaderError::TooLarge);
        }
        all_blocks.extend(html::extract_blocks(&content));
    }

    if all_blocks.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }

    let markdown = html::blocks_to_markdown(all_blocks);
    let paragraphs = paragraphs_from_markdown(&markdown);
    if paragraphs.is_empty() {
        return Err(ReaderError::ParseEmpty);
    }
    Ok(paragraphs)
}

fn read_zip_entry<R: std::io::Read + std::io::Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<String, ReaderError> {
    let mut file = archive.by_name(name).map_err(|_| ReaderError::UnsupportedFile)?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)
        .map_err(|_| ReaderError::UnsupportedFile)?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rootfile_path_reads_full_path_attribute() {
        let xml = r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/></rootfiles></container>"#;
        assert_eq!(rootfile_path(xml), Some("OEBPS/content.opf".to_string()));
    }

    #[test]
    fn parse_manifest_filters_to_xhtml_entries() {
        let opf = r#"<manifest>
            <item id="ch1" href="ch1.xhtml" media-type="application/xhtml+xml"/>
            <item id="css" href="style.css" media-type="text/css"/>
        </manifest>"#;
        let entries = parse_manifest(opf);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "ch1");
    }

    #[test]
    fn parse_spine_order_extracts_idrefs_in_order() {
        let opf = r#"<spine><itemref idref="ch1"/><itemref idref="ch2"/></spine>"#;
        assert_eq!(parse_spine_order(opf), vec!["ch1".to_string(), "ch2".to_string()]);
    }

    #[test]
    fn opf_dir_returns_directory_prefix() {
        assert_eq!(opf_dir("OEBPS/content.opf"), "OEBPS/");
        assert_eq!(opf_dir("content.opf"), "");
    }
}
