//! EPUB reader: container.xml → OPF → `dc:title` / `dc:creator`.

use std::io::{Read, Seek};

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use crate::book::BookInfo;
use crate::error::ReadError;
use crate::security::{self, ReadLimits};

pub fn read_metadata<R: Read + Seek>(input: R, limits: &ReadLimits) -> Result<BookInfo, ReadError> {
    let mut archive = zip::ZipArchive::new(input).map_err(|e| ReadError::MalformedFile {
        format: "EPUB".into(),
        detail: format!("Invalid ZIP archive: {e}"),
    })?;

    security::check_file_count(archive.len() as u64, limits)?;

    let opf_path = find_opf_path(&mut archive, limits)?;
    security::check_path_traversal(&opf_path)?;

    let opf = read_archive_entry(&mut archive, &opf_path, limits)?;
    parse_opf_metadata(&opf)
}

fn find_opf_path<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    limits: &ReadLimits,
) -> Result<String, ReadError> {
    let container = read_archive_entry(archive, "META-INF/container.xml", limits)?;

    let mut reader = XmlReader::from_str(&container);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.local_name().as_ref() == b"full-path" {
                        return Ok(String::from_utf8_lossy(&attr.value).to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReadError::MalformedFile {
                    format: "EPUB".into(),
                    detail: format!("Failed to parse container.xml: {e}"),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    Err(ReadError::MissingContent(
        "No rootfile found in container.xml".into(),
    ))
}

/// Collect the first `dc:title` and every `dc:creator` (joined with ", ")
/// from the OPF `<metadata>` block.
fn parse_opf_metadata(content: &str) -> Result<BookInfo, ReadError> {
    let mut reader = XmlReader::from_str(content);
    let mut buf = Vec::new();

    let mut title: Option<String> = None;
    let mut creators: Vec<String> = Vec::new();

    let mut in_metadata = false;
    let mut current_element: Option<String> = None;
    let mut current_text = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let local = e.local_name();
                let name = String::from_utf8_lossy(local.as_ref()).to_string();
                match name.as_str() {
                    "metadata" => in_metadata = true,
                    "title" | "creator" if in_metadata => {
                        current_element = Some(name);
                        current_text.clear();
                    }
                    _ => {}
                }
            }
            Ok(Event::Text(ref e)) => {
                if current_element.is_some() {
                    current_text.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::CData(ref e)) => {
                if current_element.is_some() {
                    current_text.push_str(&String::from_utf8_lossy(e));
                }
            }
            Ok(Event::End(ref e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if name == "metadata" {
                    // Nothing after the metadata block is of interest.
                    break;
                }

                if let Some(elem) = current_element.take() {
                    let text = current_text.trim().to_string();
                    if !text.is_empty() {
                        match elem.as_str() {
                            "title" if title.is_none() => title = Some(text),
                            "creator" => creators.push(text),
                            _ => {}
                        }
                    }
                    current_text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ReadError::MalformedFile {
                    format: "EPUB".into(),
                    detail: format!("Failed to parse OPF: {e}"),
                });
            }
            _ => {}
        }
        buf.clear();
    }

    let author = (!creators.is_empty()).then(|| creators.join(", "));
    Ok(BookInfo::new(title, author))
}

fn read_archive_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    path: &str,
    limits: &ReadLimits,
) -> Result<String, ReadError> {
    let file = archive.by_name(path).map_err(|_| {
        ReadError::MissingContent(format!("Missing required file: {path}"))
    })?;

    security::check_resource_size(path, file.size(), limits.max_entry_size_bytes)?;

    let mut content = String::new();
    file.take(limits.max_entry_size_bytes)
        .read_to_string(&mut content)
        .map_err(|e| ReadError::MalformedFile {
            format: "EPUB".into(),
            detail: format!("Failed to read {}: {}", path, e),
        })?;
    Ok(content)
}
