//! What crosses the rendering boundary, and a plain-text rendering of it.

use resealeds_protocol::MonitoredProduct;
use serde::Serialize;

pub const LOGIN_PROMPT: &str = "Please login!";

/// Read-only view of the catalog handed to the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatalogSnapshot {
    pub products: Vec<MonitoredProduct>,
    pub session_present: bool,
    /// Adding is only offered while a session is present.
    pub can_add: bool,
    /// True while a catalog read is in flight.
    pub loading: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Bumped on every state change.
    pub revision: u64,
}

pub fn render_lines(snapshot: &CatalogSnapshot) -> Vec<String> {
    let mut lines = Vec::with_capacity(snapshot.products.len() + 3);

    if !snapshot.session_present {
        lines.push(LOGIN_PROMPT.to_string());
    }

    if let Some(error) = &snapshot.last_error {
        lines.push(format!("! {}", error));
    }

    for product in &snapshot.products {
        lines.push(render_product(product));
    }

    let affordance = if snapshot.can_add {
        "[+] add product"
    } else {
        "[+] add product (sign in to enable)"
    };
    lines.push(affordance.to_string());
    lines
}

fn render_product(product: &MonitoredProduct) -> String {
    format!(
        "#{} {} | {} | {}",
        product.id,
        product.name,
        product.display_price(),
        product.detail_path()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use resealeds_protocol::ProductId;

    fn product(id: i64, name: &str, price: f64) -> MonitoredProduct {
        MonitoredProduct {
            id: ProductId::new(id).unwrap(),
            name: name.to_string(),
            img: format!("/img/{}.png", id),
            price,
        }
    }

    #[test]
    fn signed_out_view_prompts_for_login() {
        let snapshot = CatalogSnapshot {
            products: vec![product(1, "A", 10.0)],
            ..CatalogSnapshot::default()
        };
        let lines = render_lines(&snapshot);
        assert_eq!(lines[0], LOGIN_PROMPT);
        assert_eq!(lines[1], "#1 A | 10 Lei | /product/1");
        assert_eq!(lines[2], "[+] add product (sign in to enable)");
    }

    #[test]
    fn signed_in_view_enables_adding() {
        let snapshot = CatalogSnapshot {
            products: vec![product(2, "B", 19.99)],
            session_present: true,
            can_add: true,
            ..CatalogSnapshot::default()
        };
        let lines = render_lines(&snapshot);
        assert_eq!(
            lines,
            vec![
                "#2 B | 19.99 Lei | /product/2".to_string(),
                "[+] add product".to_string(),
            ]
        );
    }

    #[test]
    fn read_errors_are_surfaced() {
        let snapshot = CatalogSnapshot {
            session_present: true,
            last_error: Some("store unavailable: timeout".to_string()),
            ..CatalogSnapshot::default()
        };
        let lines = render_lines(&snapshot);
        assert_eq!(lines[0], "! store unavailable: timeout");
    }
}
