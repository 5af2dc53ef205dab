//! Extracción de texto de los documentos subidos (texto plano, PDF y Word).
//!
//! Contrato: un `SourceDocument` produce una cadena de texto plano o falla
//! con `UnsupportedFormat`, `CorruptDocument` o `EmptyDocument`. Los fallos
//! de extracción son terminales para esa entrada; no hay reintentos.

use lopdf::Document;
use tracing::info;

use crate::{
    error::PipelineError,
    models::{MediaType, SourceDocument},
};

/// Convierte un documento subido en la cadena de texto canónica que
/// consumen todas las etapas posteriores. Invariante: el resultado nunca
/// es una cadena en blanco.
pub fn extract_text(doc: &SourceDocument) -> Result<String, PipelineError> {
    let text = match doc.media_type {
        MediaType::PlainText => read_plain_text(&doc.bytes)?,
        MediaType::Pdf => extract_from_pdf(&doc.bytes)?,
        MediaType::Word => extract_from_word(&doc.bytes)?,
    };

    if text.trim().is_empty() {
        return Err(PipelineError::EmptyDocument);
    }

    info!("Extracción completada: {} caracteres", text.len());
    Ok(text)
}

/// Texto plano: los bytes se decodifican como UTF-8 tal cual, sin tocar nada.
fn read_plain_text(bytes: &[u8]) -> Result<String, PipelineError> {
    String::from_utf8(bytes.to_vec())
        .map_err(|e| PipelineError::CorruptDocument(format!("contenido UTF-8 inválido: {e}")))
}

/// PDF: se recorren todas las páginas en su orden natural y se concatena el
/// texto de cada una, separado por un salto de línea. El orden de páginas es
/// el orden de extracción; no se reordena nada.
fn extract_from_pdf(bytes: &[u8]) -> Result<String, PipelineError> {
    let document = Document::load_mem(bytes)
        .map_err(|e| PipelineError::CorruptDocument(format!("PDF ilegible: {e}")))?;

    let mut pages_text = Vec::new();
    for (page_number, _) in document.get_pages() {
        let page_text = document
            .extract_text(&[page_number])
            .map_err(|e| {
                PipelineError::CorruptDocument(format!(
                    "fallo extrayendo la página {page_number}: {e}"
                ))
            })?;
        pages_text.push(page_text.trim_end_matches('\n').to_string());
    }

    Ok(pages_text.join("\n"))
}

/// Word (.doc/.docx): se recorre el flujo de párrafos del documento y se
/// descarta todo el formato.
fn extract_from_word(bytes: &[u8]) -> Result<String, PipelineError> {
    let docx = docx_rs::read_docx(bytes)
        .map_err(|e| PipelineError::CorruptDocument(format!("documento Word ilegible: {e}")))?;

    let mut paragraphs = Vec::new();
    for child in docx.document.children {
        if let docx_rs::DocumentChild::Paragraph(paragraph) = child {
            let text: String = paragraph
                .children
                .iter()
                .filter_map(|pc| match pc {
                    docx_rs::ParagraphChild::Run(run) => Some(
                        run.children
                            .iter()
                            .filter_map(|rc| match rc {
                                docx_rs::RunChild::Text(t) => Some(t.text.clone()),
                                _ => None,
                            })
                            .collect::<Vec<_>>()
                            .join(""),
                    ),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("");

            if !text.trim().is_empty() {
                paragraphs.push(text);
            }
        }
    }

    Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(bytes: &[u8], media_type: MediaType) -> SourceDocument {
        SourceDocument { bytes: bytes.to_vec(), media_type }
    }

    #[test]
    fn texto_plano_se_devuelve_literal() {
        let contenido = "La fotosíntesis convierte luz en energía química.\nSegunda línea.";
        let result = extract_text(&doc(contenido.as_bytes(), MediaType::PlainText)).unwrap();
        assert_eq!(result, contenido);
    }

    #[test]
    fn utf8_invalido_es_documento_corrupto() {
        let result = extract_text(&doc(&[0xff, 0xfe, 0x41], MediaType::PlainText));
        assert!(matches!(result, Err(PipelineError::CorruptDocument(_))));
    }

    #[test]
    fn fichero_en_blanco_es_documento_vacio() {
        let result = extract_text(&doc(b"   \n\t  ", MediaType::PlainText));
        assert!(matches!(result, Err(PipelineError::EmptyDocument)));
    }

    #[test]
    fn mime_desconocido_se_rechaza_antes_de_extraer() {
        let result = MediaType::from_declared("image/png");
        assert!(matches!(result, Err(PipelineError::UnsupportedFormat(m)) if m == "image/png"));
    }

    #[test]
    fn bytes_basura_como_pdf_son_documento_corrupto() {
        let result = extract_text(&doc(b"esto no es un pdf", MediaType::Pdf));
        assert!(matches!(result, Err(PipelineError::CorruptDocument(_))));
    }

    #[test]
    fn bytes_basura_como_word_son_documento_corrupto() {
        let result = extract_text(&doc(b"tampoco es un docx", MediaType::Word));
        assert!(matches!(result, Err(PipelineError::CorruptDocument(_))));
    }

    #[test]
    fn pdf_de_dos_paginas_conserva_el_orden() {
        let bytes = build_pdf(&["Pagina uno", "Pagina dos"]);
        let result = extract_text(&doc(&bytes, MediaType::Pdf)).unwrap();
        let pos_uno = result.find("Pagina uno").expect("falta la página 1");
        let pos_dos = result.find("Pagina dos").expect("falta la página 2");
        assert!(pos_uno < pos_dos);
        // Un separador de salto de línea entre los segmentos de página.
        assert!(result[pos_uno..pos_dos].contains('\n'));
    }

    #[test]
    fn docx_construido_en_memoria_se_extrae() {
        use docx_rs::{Docx, Paragraph, Run};

        let mut buffer = std::io::Cursor::new(Vec::new());
        Docx::new()
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Hola desde Word")))
            .add_paragraph(Paragraph::new().add_run(Run::new().add_text("Segundo parrafo")))
            .build()
            .pack(&mut buffer)
            .unwrap();

        let result = extract_text(&doc(buffer.get_ref(), MediaType::Word)).unwrap();
        assert_eq!(result, "Hola desde Word\nSegundo parrafo");
    }

    /// PDF mínimo de una fuente Courier con una página por cada texto dado.
    fn build_pdf(pages: &[&str]) -> Vec<u8> {
        use lopdf::content::{Content, Operation};
        use lopdf::{dictionary, Object, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids = Vec::new();
        for text in pages {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 12.into()]),
                    Operation::new("Td", vec![50.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*text)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }
}
