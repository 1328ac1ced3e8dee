//! Builders for small but structurally valid documents used across tests.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use lopdf::{dictionary, Document, Object};

pub fn write_pdf(path: &Path, title: Option<&str>, author: Option<&str>) {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut info = lopdf::Dictionary::new();
    if let Some(title) = title {
        info.set("Title", Object::string_literal(title));
    }
    if let Some(author) = author {
        info.set("Author", Object::string_literal(author));
    }
    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);

    doc.save(path).unwrap();
}

pub fn write_epub(path: &Path, title: Option<&str>, creators: &[&str]) {
    let mut metadata = String::new();
    if let Some(title) = title {
        metadata.push_str(&format!("    <dc:title>{title}</dc:title>\n"));
    }
    for creator in creators {
        metadata.push_str(&format!("    <dc:creator>{creator}</dc:creator>\n"));
    }
    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="3.0" unique-identifier="id">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="id">urn:uuid:00000000-0000-0000-0000-000000000000</dc:identifier>
{metadata}  </metadata>
  <manifest>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine><itemref idref="c1"/></spine>
</package>
"#
    );
    let container = r#"<?xml version="1.0"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#;

    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    let stored = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored);
    zip.start_file("mimetype", stored).unwrap();
    zip.write_all(b"application/epub+zip").unwrap();
    zip.start_file("META-INF/container.xml", stored).unwrap();
    zip.write_all(container.as_bytes()).unwrap();
    zip.start_file("OEBPS/content.opf", stored).unwrap();
    zip.write_all(opf.as_bytes()).unwrap();
    zip.start_file("OEBPS/c1.xhtml", stored).unwrap();
    zip.write_all(b"<html xmlns=\"http://www.w3.org/1999/xhtml\"><body><p>Hi</p></body></html>")
        .unwrap();
    zip.finish().unwrap();
}

/// A single-record PalmDB/MOBI file with a UTF-8 EXTH block.
pub fn mobi_bytes(full_name: &str, exth: &[(u32, &str)]) -> Vec<u8> {
    const MOBI_HEADER_LEN: u32 = 232;

    let mut exth_block = Vec::new();
    let body: usize = exth.iter().map(|(_, v)| 8 + v.len()).sum();
    exth_block.extend_from_slice(b"EXTH");
    exth_block.extend_from_slice(&((12 + body) as u32).to_be_bytes());
    exth_block.extend_from_slice(&(exth.len() as u32).to_be_bytes());
    for (kind, value) in exth {
        exth_block.extend_from_slice(&kind.to_be_bytes());
        exth_block.extend_from_slice(&((8 + value.len()) as u32).to_be_bytes());
        exth_block.extend_from_slice(value.as_bytes());
    }

    let mut record0 = vec![0u8; 16 + MOBI_HEADER_LEN as usize];
    record0[16..20].copy_from_slice(b"MOBI");
    record0[20..24].copy_from_slice(&MOBI_HEADER_LEN.to_be_bytes());
    record0[28..32].copy_from_slice(&65001u32.to_be_bytes());
    record0[128..132].copy_from_slice(&0x40u32.to_be_bytes());
    record0.extend_from_slice(&exth_block);
    let name_offset = record0.len() as u32;
    record0[84..88].copy_from_slice(&name_offset.to_be_bytes());
    record0[88..92].copy_from_slice(&(full_name.len() as u32).to_be_bytes());
    record0.extend_from_slice(full_name.as_bytes());

    let mut data = vec![0u8; 78];
    data[..full_name.len().min(31)].copy_from_slice(&full_name.as_bytes()[..full_name.len().min(31)]);
    data[60..68].copy_from_slice(b"BOOKMOBI");
    data[76..78].copy_from_slice(&1u16.to_be_bytes());
    let record0_offset = 78u32 + 8 + 2;
    data.extend_from_slice(&record0_offset.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 0]);
    data.extend_from_slice(&[0, 0]);
    data.extend_from_slice(&record0);
    data
}
