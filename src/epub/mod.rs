//! EPUB 3 writer. Consumes a batch [Book] and writes mimetype, container, OPF, nav, NCX,
//! and one XHTML file per chapter.

use crate::model::{Book, Chapter};
use std::io::{Seek, Write};
use std::path::Path;
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

const CONTAINER_XML: &[u8] = b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<container version=\"1.0\" xmlns=\"urn:oasis:names:tc:opendocument:xmlns:container\">\n  <rootfiles>\n    <rootfile full-path=\"OEBPS/content.opf\" media-type=\"application/oebps-package+xml\"/>\n  </rootfiles>\n</container>";

const MIMETYPE: &[u8] = b"application/epub+zip";
const OEBPS_PREFIX: &str = "OEBPS/";
/// Heading the table of contents is grouped under.
const TOC_SECTION: &str = "Scraped Text";

/// Errors from the EPUB writer.
#[derive(Debug, Error)]
pub enum EpubError {
    #[error("Cannot write EPUB: book title is empty.")]
    EmptyTitle,

    #[error("Cannot write EPUB: book has no chapters.")]
    NoChapters,

    #[error("Failed to create EPUB file: {path}: {source}")]
    CreateFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write EPUB: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write EPUB archive: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Write `book` to an EPUB 3 file at `path`. The nav document is first in the spine and
/// an NCX is included for older readers.
pub fn write_epub(book: &Book, path: &Path) -> Result<(), EpubError> {
    validate_book(book)?;

    let file = std::fs::File::create(path).map_err(|e| EpubError::CreateFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut zip = ZipWriter::new(file);

    let options_stored = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    let options_deflate = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    // Mimetype first, uncompressed
    zip.start_file("mimetype", options_stored)?;
    zip.write_all(MIMETYPE)?;

    zip.start_file("META-INF/container.xml", options_deflate)?;
    zip.write_all(CONTAINER_XML)?;

    write_opf(book, &mut zip, options_deflate)?;
    write_nav_xhtml(book, &mut zip, options_deflate)?;
    write_ncx(book, &mut zip, options_deflate)?;
    write_chapters(book, &mut zip, options_deflate)?;

    zip.finish()?;
    Ok(())
}

fn validate_book(book: &Book) -> Result<(), EpubError> {
    if book.title.trim().is_empty() {
        return Err(EpubError::EmptyTitle);
    }
    if book.chapters.is_empty() {
        return Err(EpubError::NoChapters);
    }
    Ok(())
}

/// Unique per novel and batch.
fn identifier(book: &Book) -> String {
    let slug: String = book
        .title
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    format!(
        "urn:novelscrape:{}:{}-{}",
        slug.trim_matches('-'),
        book.range.0,
        book.range.1
    )
}

fn write_opf(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut manifest = String::from(
        r#"    <item id="nav" href="nav.xhtml" media-type="application/xhtml+xml" properties="nav"/>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
"#,
    );
    let mut spine = String::from(r#"    <itemref idref="nav"/>"#);
    for ch in &book.chapters {
        manifest.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            ch.id(),
            ch.file_name()
        ));
        spine.push_str(&format!("\n    <itemref idref=\"{}\"/>", ch.id()));
    }

    let description_el = book
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .map(|d| format!("\n    <dc:description>{}</dc:description>", xml_escape(d)))
        .unwrap_or_default();

    let opf = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" unique-identifier="book-id" version="3.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:identifier id="book-id">{id}</dc:identifier>
    <dc:title>{title}</dc:title>
    <dc:creator>{creator}</dc:creator>
    <dc:language>{language}</dc:language>{description_el}
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine toc="ncx">
{spine}
  </spine>
</package>
"#,
        id = xml_escape(&identifier(book)),
        title = xml_escape(&book.title),
        creator = xml_escape(&book.author),
        language = xml_escape(&book.language),
        description_el = description_el,
        manifest = manifest,
        spine = spine,
    );

    zip.start_file(format!("{}content.opf", OEBPS_PREFIX), options)?;
    zip.write_all(opf.as_bytes())?;
    Ok(())
}

fn write_nav_xhtml(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_links = String::new();
    for ch in &book.chapters {
        nav_links.push_str(&format!(
            "          <li><a href=\"{}\">{}</a></li>\n",
            ch.file_name(),
            xml_escape(&ch.title)
        ));
    }
    let nav = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
  <nav epub:type="toc" id="toc">
    <h1>{title}</h1>
    <ol>
      <li>
        <span>{section}</span>
        <ol>
{links}        </ol>
      </li>
    </ol>
  </nav>
</body>
</html>
"#,
        title = xml_escape(&book.title),
        section = TOC_SECTION,
        links = nav_links
    );
    zip.start_file(format!("{}nav.xhtml", OEBPS_PREFIX), options)?;
    zip.write_all(nav.as_bytes())?;
    Ok(())
}

fn write_ncx(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    let mut nav_points = String::new();
    for (i, ch) in book.chapters.iter().enumerate() {
        nav_points.push_str(&format!(
            r#"      <navPoint id="navpoint-{order}" playOrder="{order}">
        <navLabel><text>{label}</text></navLabel>
        <content src="{src}"/>
      </navPoint>
"#,
            order = i + 2,
            label = xml_escape(&ch.title),
            src = ch.file_name()
        ));
    }
    let first = book
        .chapters
        .first()
        .map(Chapter::file_name)
        .unwrap_or_default();
    let ncx = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <head>
    <meta name="dtb:uid" content="{uid}"/>
  </head>
  <docTitle>
    <text>{title}</text>
  </docTitle>
  <navMap>
    <navPoint id="navpoint-1" playOrder="1">
      <navLabel><text>{section}</text></navLabel>
      <content src="{first}"/>
{points}    </navPoint>
  </navMap>
</ncx>
"#,
        uid = xml_escape(&identifier(book)),
        title = xml_escape(&book.title),
        section = TOC_SECTION,
        first = first,
        points = nav_points
    );
    zip.start_file(format!("{}toc.ncx", OEBPS_PREFIX), options)?;
    zip.write_all(ncx.as_bytes())?;
    Ok(())
}

/// Chapter markup: heading plus body. Plain-text bodies (placeholders) get a paragraph.
fn chapter_markup(ch: &Chapter) -> String {
    let body = ch.body.trim();
    let body = if body.starts_with('<') {
        body.to_string()
    } else {
        format!("<p>{}</p>", xml_escape(body))
    };
    format!("<h2>{}</h2>\n{}", xml_escape(&ch.title), body)
}

fn write_chapters(
    book: &Book,
    zip: &mut ZipWriter<impl Write + Seek>,
    options: SimpleFileOptions,
) -> Result<(), EpubError> {
    for ch in &book.chapters {
        let html = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE html>
<html xmlns="http://www.w3.org/1999/xhtml" lang="{lang}">
<head>
  <meta charset="UTF-8"/>
  <title>{title}</title>
</head>
<body>
{body}
</body>
</html>
"#,
            lang = xml_escape(&book.language),
            title = xml_escape(&ch.title),
            body = chapter_markup(ch)
        );
        zip.start_file(format!("{}{}", OEBPS_PREFIX, ch.file_name()), options)?;
        zip.write_all(html.as_bytes())?;
    }
    Ok(())
}

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
