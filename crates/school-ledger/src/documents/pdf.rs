use std::fmt::Write as _;

use tracing::debug;

use super::layout::{DrawOp, Font, PageLayout};
use super::{DocumentRenderer, RenderError};

/// Writes a single-page PDF 1.4 file using the built-in Helvetica faces.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfRenderer;

impl DocumentRenderer for PdfRenderer {
    fn content_type(&self) -> mime::Mime {
        mime::APPLICATION_PDF
    }

    fn extension(&self) -> &'static str {
        "pdf"
    }

    fn render(&self, layout: &PageLayout) -> Result<Vec<u8>, RenderError> {
        if layout.width <= 0.0 || layout.height <= 0.0 {
            return Err(RenderError::InvalidPage {
                width: layout.width,
                height: layout.height,
            });
        }

        let content = content_stream(layout);
        Ok(assemble(layout, &content))
    }
}

fn font_resource(font: Font) -> &'static str {
    match font {
        Font::Regular => "F1",
        Font::Bold => "F2",
    }
}

/// Map to WinAnsi bytes and escape PDF string delimiters. Characters outside the
/// encoding print as `?`.
fn encode_text(text: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len());
    for ch in text.chars() {
        let code = match ch {
            '(' | ')' | '\\' => {
                bytes.push(b'\\');
                ch as u32
            }
            '€' => 0x80,
            '’' => 0x92,
            '–' => 0x96,
            '\u{20}'..='\u{7e}' | '\u{a0}'..='\u{ff}' => ch as u32,
            _ => {
                debug!(character = %ch, "character outside WinAnsi replaced");
                u32::from(b'?')
            }
        };
        bytes.push(code as u8);
    }
    bytes
}

fn content_stream(layout: &PageLayout) -> Vec<u8> {
    let flip = |y: f32| layout.height - y;
    let mut out: Vec<u8> = Vec::new();
    let mut ops = String::new();

    for op in &layout.ops {
        ops.clear();
        match op {
            DrawOp::Text {
                x,
                y,
                size,
                font,
                text,
            } => {
                let _ = write!(
                    ops,
                    "BT /{} {:.2} Tf {:.2} {:.2} Td (",
                    font_resource(*font),
                    size,
                    x,
                    flip(*y)
                );
                out.extend_from_slice(ops.as_bytes());
                out.extend_from_slice(&encode_text(text));
                out.extend_from_slice(b") Tj ET\n");
            }
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                fill,
            } => {
                let bottom = flip(y + height);
                match fill {
                    Some(gray) => {
                        let _ = writeln!(
                            ops,
                            "q {:.2} g {:.2} {:.2} {:.2} {:.2} re f Q",
                            gray, x, bottom, width, height
                        );
                    }
                    None => {
                        let _ = writeln!(
                            ops,
                            "0.5 w {:.2} {:.2} {:.2} {:.2} re S",
                            x, bottom, width, height
                        );
                    }
                }
                out.extend_from_slice(ops.as_bytes());
            }
            DrawOp::Line {
                x1,
                y1,
                x2,
                y2,
                width,
            } => {
                let _ = writeln!(
                    ops,
                    "{:.2} w {:.2} {:.2} m {:.2} {:.2} l S",
                    width,
                    x1,
                    flip(*y1),
                    x2,
                    flip(*y2)
                );
                out.extend_from_slice(ops.as_bytes());
            }
        }
    }

    out
}

fn assemble(layout: &PageLayout, content: &[u8]) -> Vec<u8> {
    let objects: Vec<Vec<u8>> = vec![
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {:.2} {:.2}] \
             /Resources << /Font << /F1 4 0 R /F2 5 0 R >> >> /Contents 6 0 R >>",
            layout.width, layout.height
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica-Bold /Encoding /WinAnsiEncoding >>"
            .to_vec(),
        {
            let mut stream = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            stream.extend_from_slice(content);
            stream.extend_from_slice(b"\nendstream");
            stream
        },
    ];

    let mut pdf: Vec<u8> = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (index, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n", index + 1).as_bytes());
        pdf.extend_from_slice(body);
        pdf.extend_from_slice(b"\nendobj\n");
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        let _ = writeln!(xref, "{offset:010} 00000 n ");
    }
    let _ = write!(
        xref,
        "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
        objects.len() + 1,
        xref_offset
    );
    pdf.extend_from_slice(xref.as_bytes());
    pdf
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PageLayout {
        let mut page = PageLayout::a4();
        page.text(40.0, 60.0, 12.0, Font::Bold, "Reçu (copie)");
        page.rect(40.0, 80.0, 100.0, 20.0, None);
        page
    }

    #[test]
    fn output_is_a_pdf_with_trailer() {
        let bytes = PdfRenderer.render(&sample()).expect("renders");
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
    }

    #[test]
    fn xref_points_at_object_headers() {
        let bytes = PdfRenderer.render(&sample()).expect("renders");
        let text = String::from_utf8_lossy(&bytes);
        let start = text.rfind("startxref\n").expect("startxref present") + "startxref\n".len();
        let xref_offset: usize = text[start..]
            .lines()
            .next()
            .and_then(|line| line.trim().parse().ok())
            .expect("numeric offset");
        assert!(bytes[xref_offset..].starts_with(b"xref"));
    }

    #[test]
    fn text_is_escaped_and_latin1_encoded() {
        assert_eq!(encode_text("Reçu (1)"), b"Re\xE7u \\(1\\)".to_vec());
        assert_eq!(encode_text("A漢"), b"A?".to_vec());
    }

    #[test]
    fn rejects_empty_pages() {
        let page = PageLayout {
            width: 0.0,
            height: 0.0,
            ops: Vec::new(),
        };
        assert!(matches!(
            PdfRenderer.render(&page),
            Err(RenderError::InvalidPage { .. })
        ));
    }
}
