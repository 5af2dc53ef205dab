//! Parser del mapa mental.
//!
//! Cadena de estrategias, cada una total (nunca lanza), probadas en orden
//! fijo:
//!   1. la respuesta completa como JSON `{name, children}`;
//!   2. la primera subcadena delimitada por llaves dentro de la respuesta;
//!   3. derivación local a partir de los encabezados `#` del texto crudo.
//! La derivación por encabezados siempre produce un árbol (como mínimo de
//! un solo nodo), así que es el respaldo garantizado del contrato.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::models::MindMapNode;

/// Nombre de raíz por defecto cuando el texto no aporta uno.
const DEFAULT_ROOT: &str = "Main Topic";

/// Máximo de palabras por nombre de nodo en la derivación local.
const MAX_NODE_WORDS: usize = 4;

/// Ancho de línea al que se parten las etiquetas para su presentación.
const LABEL_WRAP_CHARS: usize = 18;

static BRACE_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[\s\S]*\}").unwrap());
static HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(#+)\s*(.*)").unwrap());

/// Cadena completa: estructura directa, luego subcadena JSON, luego
/// derivación por encabezados del texto crudo. Nunca falla. El respaldo es
/// silencioso para el llamante pero queda registrado.
pub fn parse(response: &str, raw_text: &str) -> MindMapNode {
    match structured(response) {
        Some(tree) => tree,
        None => {
            warn!("Respuesta de mapa mental no parseable; derivando de los encabezados");
            from_headings(raw_text)
        }
    }
}

/// Estrategias (1) y (2): intenta leer la respuesta como el formato de nodo
/// estructurado, directamente o buscando el primer bloque entre llaves.
pub fn structured(response: &str) -> Option<MindMapNode> {
    if let Ok(node) = serde_json::from_str::<MindMapNode>(response) {
        if !node.name.trim().is_empty() {
            return Some(node);
        }
    }

    let block = BRACE_BLOCK.find(response)?;
    match serde_json::from_str::<MindMapNode>(block.as_str()) {
        Ok(node) if !node.name.trim().is_empty() => Some(node),
        _ => None,
    }
}

/// Estrategia (3): deriva un árbol de los marcadores de encabezado del texto.
/// `#` fija el nombre de la raíz, `##` crea un hijo de la raíz y `###`
/// (sólo inmediatamente bajo un `##` previo) añade una hoja a ese hijo.
pub fn from_headings(text: &str) -> MindMapNode {
    let mut root = MindMapNode { name: DEFAULT_ROOT.to_string(), children: Vec::new() };
    let mut last_level = 1usize;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let Some(caps) = HEADING_LINE.captures(line) else { continue };
        let level = caps[1].len();
        let name = cap_words(caps[2].trim());
        if name.is_empty() {
            continue;
        }

        match level {
            1 => root.name = name,
            2 => {
                root.children.push(MindMapNode::leaf(name));
                last_level = 2;
            }
            3 if last_level == 2 => {
                if let Some(parent) = root.children.last_mut() {
                    parent.children.push(MindMapNode::leaf(name));
                }
            }
            _ => {}
        }
    }

    root
}

/// Recorta un nombre de nodo al límite de palabras de la plantilla.
fn cap_words(name: &str) -> String {
    name.split_whitespace()
        .take(MAX_NODE_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parte una etiqueta en líneas de como mucho 18 caracteres, cortando por
/// palabras. Sólo afecta a la presentación; el nombre original del nodo se
/// conserva intacto para cualquier otro uso.
pub fn wrap_label(name: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();

    for word in name.split_whitespace() {
        if current.len() + word.len() <= LABEL_WRAP_CHARS {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
        } else {
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            current = word.to_string();
        }
    }
    lines.push(current);

    lines.join("\n")
}

/// Versión de presentación del árbol: cada nodo conserva su nombre original
/// intacto y añade la etiqueta partida para el lienzo del mapa.
pub fn with_display_labels(node: &MindMapNode) -> serde_json::Value {
    serde_json::json!({
        "name": node.name,
        "label": wrap_label(&node.name),
        "children": node.children.iter().map(with_display_labels).collect::<Vec<_>>(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_directo_se_parsea_como_estructura() {
        let response = r#"{"name":"Biología","children":[{"name":"Células"}]}"#;
        let node = structured(response).unwrap();
        assert_eq!(node.name, "Biología");
        assert_eq!(node.children[0].name, "Células");
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn json_incrustado_en_prosa_se_recupera() {
        let response = "Aquí tienes el mapa:\n```json\n{\"name\":\"Historia\",\"children\":[]}\n```\n¡Espero que sirva!";
        let node = structured(response).unwrap();
        assert_eq!(node.name, "Historia");
    }

    #[test]
    fn los_encabezados_derivan_el_arbol_esperado() {
        let text = "# Root\n## Child A\n### Leaf 1";
        let node = from_headings(text);
        assert_eq!(node.name, "Root");
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].name, "Child A");
        assert_eq!(node.children[0].children.len(), 1);
        assert_eq!(node.children[0].children[0].name, "Leaf 1");
    }

    #[test]
    fn nivel_tres_sin_nivel_dos_previo_se_ignora() {
        let text = "# Root\n### Huerfano\n## Hijo";
        let node = from_headings(text);
        assert_eq!(node.children.len(), 1);
        assert_eq!(node.children[0].name, "Hijo");
        assert!(node.children[0].children.is_empty());
    }

    #[test]
    fn texto_sin_encabezados_produce_arbol_de_un_nodo() {
        let node = parse("respuesta sin estructura alguna", "texto plano sin marcadores");
        assert_eq!(node.name, "Main Topic");
        assert!(node.children.is_empty());
    }

    #[test]
    fn los_nombres_se_limitan_a_cuatro_palabras() {
        let text = "# Uno dos tres cuatro cinco seis";
        let node = from_headings(text);
        assert_eq!(node.name, "Uno dos tres cuatro");
    }

    #[test]
    fn la_etiqueta_se_parte_sin_alterar_el_nombre() {
        let name = "Conceptos fundamentales de termodinámica aplicada";
        let wrapped = wrap_label(name);
        assert!(wrapped.contains('\n'));
        for line in wrapped.lines() {
            // Cada línea respeta el ancho salvo palabras más largas que él.
            assert!(line.len() <= LABEL_WRAP_CHARS || !line.contains(' '));
        }
        assert_eq!(wrapped.replace('\n', " "), name);
    }

    #[test]
    fn una_primera_palabra_larga_no_deja_linea_en_blanco() {
        let wrapped = wrap_label("Electroencefalografista ambulante");
        assert!(!wrapped.starts_with('\n'));
        assert_eq!(wrapped, "Electroencefalografista\nambulante");
    }

    #[test]
    fn la_version_de_presentacion_lleva_nombre_y_etiqueta() {
        let node = MindMapNode {
            name: "Conceptos fundamentales de termodinámica".to_string(),
            children: vec![MindMapNode::leaf("Entropía")],
        };
        let value = with_display_labels(&node);
        assert_eq!(value["name"], "Conceptos fundamentales de termodinámica");
        assert!(value["label"].as_str().unwrap().contains('\n'));
        assert_eq!(value["children"][0]["name"], "Entropía");
    }

    #[test]
    fn el_json_ilegible_cae_a_los_encabezados() {
        let node = parse("{rotísimo", "# Química\n## Enlaces");
        assert_eq!(node.name, "Química");
        assert_eq!(node.children[0].name, "Enlaces");
    }
}
