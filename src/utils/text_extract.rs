use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use pdf_extract::extract_text as extract_pdf_text;
use quick_xml::{Reader as XmlReader, events::Event};
use zip::ZipArchive;

const PREVIEW_CHAR_LIMIT: usize = 4000;

/// Extracts a plain-text preview of a stored document off the async runtime.
pub async fn document_preview(path: PathBuf) -> Result<String> {
    let text = tokio::task::spawn_blocking(move || read_document_text(&path))
        .await
        .map_err(|err| anyhow!("text extraction task failed: {err}"))??;
    Ok(truncate_chars(&text, PREVIEW_CHAR_LIMIT))
}

pub fn read_document_text(path: &Path) -> Result<String> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase();

    match extension.as_str() {
        "pdf" => extract_pdf_text(path)
            .with_context(|| format!("failed to extract PDF text from {}", path.display())),
        "docx" => extract_docx_text(path),
        "pptx" => extract_pptx_text(path),
        "txt" => fs::read_to_string(path)
            .with_context(|| format!("failed to read text file {}", path.display())),
        other => Err(anyhow!("unsupported file type: {}", other)),
    }
    .map(|content| content.trim().to_string())
}

fn truncate_chars(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}

fn extract_docx_text(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;
    let xml = read_entry(&mut archive, "word/document.xml", path)?;
    collect_xml_text(&xml, b"w:p", b"w:t", "\n\n")
}

fn extract_pptx_text(path: &Path) -> Result<String> {
    let mut archive = open_archive(path)?;

    let mut slides: Vec<(u32, String)> = archive
        .file_names()
        .filter_map(|name| {
            let number = name
                .strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse::<u32>()
                .ok()?;
            Some((number, name.to_string()))
        })
        .collect();
    slides.sort_by_key(|(number, _)| *number);

    let mut sections = Vec::with_capacity(slides.len());
    for (_, name) in slides {
        let xml = read_entry(&mut archive, &name, path)?;
        let text = collect_xml_text(&xml, b"a:p", b"a:t", "\n")?;
        if !text.is_empty() {
            sections.push(text);
        }
    }

    Ok(sections.join("\n\n"))
}

fn open_archive(path: &Path) -> Result<ZipArchive<fs::File>> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open document {}", path.display()))?;
    ZipArchive::new(file).with_context(|| format!("failed to open archive {}", path.display()))
}

fn read_entry(archive: &mut ZipArchive<fs::File>, name: &str, path: &Path) -> Result<String> {
    let mut entry = archive
        .by_name(name)
        .with_context(|| format!("missing {name} in {}", path.display()))?;
    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .with_context(|| format!("failed to read {name} from {}", path.display()))?;
    Ok(xml)
}

/// Concatenates text nodes, separating paragraph elements with `separator`.
fn collect_xml_text(
    xml: &str,
    paragraph_tag: &[u8],
    text_tag: &[u8],
    separator: &str,
) -> Result<String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    let mut output = String::new();
    let mut in_text_node = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = e.name();
                if name.as_ref() == paragraph_tag {
                    if !output.is_empty() {
                        output.push_str(separator);
                    }
                } else if name.as_ref() == text_tag {
                    in_text_node = true;
                } else if name.as_ref() == b"w:tab" {
                    output.push('\t');
                } else if name.as_ref() == b"w:br" || name.as_ref() == b"a:br" {
                    output.push('\n');
                }
            }
            Ok(Event::Empty(ref e)) => {
                let name = e.name();
                if name.as_ref() == b"w:tab" {
                    output.push('\t');
                } else if name.as_ref() == b"w:br" || name.as_ref() == b"a:br" {
                    output.push('\n');
                }
            }
            Ok(Event::Text(e)) => {
                if in_text_node {
                    let value = e.unescape().map_err(|err| anyhow!(err))?.into_owned();
                    output.push_str(&value);
                }
            }
            Ok(Event::End(ref e)) => {
                if e.name().as_ref() == text_tag {
                    in_text_node = false;
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => return Err(anyhow!("failed to parse document XML: {}", err)),
            _ => {}
        }
        buf.clear();
    }

    Ok(output.trim().to_string())
}
