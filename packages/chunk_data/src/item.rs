
use serde::{Serialize, Deserialize};


/// An item lying on a tile, possibly containing other items.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub type_id: String,
    #[serde(default)]
    pub charges: i32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub active: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contents: Vec<Item>,
}

impl Item {
    pub fn new(type_id: impl Into<String>) -> Self {
        Item {
            type_id: type_id.into(),
            charges: 0,
            damage: 0,
            active: false,
            contents: Vec::new(),
        }
    }

    pub fn with_charges(mut self, charges: i32) -> Self {
        self.charges = charges;
        self
    }

    /// Put another item inside this one.
    pub fn put_in(&mut self, item: Item) {
        self.contents.push(item);
    }

    /// Copy of this item with its contents left out.
    pub fn without_contents(&self) -> Item {
        Item {
            type_id: self.type_id.clone(),
            contents: Vec::new(),
            ..*self
        }
    }
}
