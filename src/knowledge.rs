//! Grounding documents.
//!
//! A [`KnowledgeSource`] is the immutable text a session is constrained to
//! answer from.  It is cheap to clone and never changes once built; grounding a
//! conversation in different text means starting a new session.

use std::fmt;
use std::sync::Arc;

use crate::types::FileData;

/// The menu the restaurant persona is grounded in when no file is supplied.
pub const DEFAULT_MENU: &str = r#"
# 1947 LONDON: Christmas Menu

Served 1st to 31st December. Lunch 12:00-15:00, dinner 17:30-22:30.
Closed on Christmas Day evening. Bookings of 8 or more require a £10 deposit per guest.

## Allergy codes
(G) contains gluten, (D) contains dairy, (N) contains nuts, (E) contains egg,
(F) contains fish, (S) contains shellfish, (V) vegetarian, (VG) vegan.
Please tell your server about any allergy before ordering.

## Starters
- Roasted parsnip & apple soup, sourdough croutons £9 (G) (D) (V)
- Oak-smoked salmon, pickled cucumber, rye bread £13 (F) (G)
- Chicken liver parfait, spiced plum chutney, brioche £11 (G) (D) (E)
- Beetroot carpaccio, candied walnuts, orange dressing £10 (N) (VG)

## Mains
- Traditional roast turkey, pigs in blankets, sage & onion stuffing £25 (G)
- Slow-braised beef rib, horseradish mash, red wine jus £29 (D)
- Pan-roasted cod, brown shrimp butter, samphire £24 (F) (S) (D)
- Chestnut & mushroom Wellington, cranberry gravy £19 (G) (N) (VG)

## Sides
- Goose-fat roast potatoes £5
- Honey-glazed carrots & parsnips £5 (V)
- Brussels sprouts, chestnuts & pancetta £6 (N)

## Desserts
- Christmas pudding, brandy custard £9 (G) (D) (E) (N)
- Dark chocolate & clementine tart £9 (G) (D) (E) (V)
- Mulled-wine poached pear, vanilla sorbet £8 (VG)

## Set menu
Three courses £45 per person, available for tables of up to 12.
Children under 12: two courses £18.

## Drinks
- Mulled wine £7
- Non-alcoholic spiced apple punch £5 (VG)
"#;

/// Immutable grounding text plus an optional display name.
#[derive(Clone, PartialEq, Eq)]
pub struct KnowledgeSource {
    name: Option<Arc<str>>,
    text: Arc<str>,
}

impl KnowledgeSource {
    /// Wrap `text` as an unnamed knowledge source.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            name: None,
            text: text.into(),
        }
    }

    /// Wrap `text`, remembering where it came from.
    pub fn named(name: impl Into<Arc<str>>, text: impl Into<Arc<str>>) -> Self {
        Self {
            name: Some(name.into()),
            text: text.into(),
        }
    }

    /// The built-in restaurant menu.
    pub fn builtin_menu() -> Self {
        Self::named("1947 London Christmas menu", DEFAULT_MENU.trim())
    }

    /// The grounding text, verbatim.
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// The source's display name, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Length of the text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// True if the text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

// Keeps the whole document out of log lines.
impl fmt::Debug for KnowledgeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeSource")
            .field("name", &self.name)
            .field("len", &self.text.len())
            .finish()
    }
}

impl From<&str> for KnowledgeSource {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

impl From<String> for KnowledgeSource {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<FileData> for KnowledgeSource {
    fn from(file: FileData) -> Self {
        Self::named(file.name, file.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_menu_has_allergy_codes() {
        let menu = KnowledgeSource::builtin_menu();
        assert!(menu.as_str().contains("Traditional roast turkey"));
        assert!(menu.as_str().contains("(G) contains gluten"));
        assert_eq!(menu.name(), Some("1947 London Christmas menu"));
    }

    #[test]
    fn clones_share_text() {
        let source = KnowledgeSource::from("Menu: Turkey £25 (G)");
        let copy = source.clone();
        assert!(std::ptr::eq(source.as_str(), copy.as_str()));
    }

    #[test]
    fn from_file_data() {
        let file = FileData {
            name: "menu.md".to_string(),
            content: "# Menu".to_string(),
            size: 6,
        };
        let source = KnowledgeSource::from(file);
        assert_eq!(source.name(), Some("menu.md"));
        assert_eq!(source.as_str(), "# Menu");
        assert_eq!(source.len(), 6);
    }

    #[test]
    fn debug_omits_text() {
        let source = KnowledgeSource::new("secret recipe");
        assert!(!format!("{source:?}").contains("secret recipe"));
    }
}
