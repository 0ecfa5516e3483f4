//! Shopping bag types.

use serde::Serialize;

use bookstore_core::{BagId, BagItemId, BookId, BookStatus, Price, UserId};

/// A line in a bag, joined with the live state of its book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagLine {
    pub item_id: BagItemId,
    pub book_id: BookId,
    pub title: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub stock: i32,
    pub status: BookStatus,
}

impl BagLine {
    /// Unit price times quantity, at the book's current price.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.unit_price.times(self.quantity)
    }
}

/// A bag as returned to clients.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BagView {
    pub cart_id: BagId,
    pub user_id: UserId,
    pub is_active: bool,
    pub items: Vec<BagItemView>,
    pub total_amount: Price,
    pub total_items: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BagItemView {
    pub item_id: BagItemId,
    pub book_id: BookId,
    pub book_title: String,
    pub unit_price: Price,
    pub quantity: u32,
    pub subtotal: Price,
}

impl BagView {
    /// Build the client view of an open bag from its lines.
    #[must_use]
    pub fn open(cart_id: BagId, user_id: UserId, lines: &[BagLine]) -> Self {
        let items: Vec<BagItemView> = lines
            .iter()
            .map(|line| BagItemView {
                item_id: line.item_id,
                book_id: line.book_id,
                book_title: line.title.clone(),
                unit_price: line.unit_price,
                quantity: line.quantity,
                subtotal: line.subtotal(),
            })
            .collect();

        Self {
            cart_id,
            user_id,
            is_active: true,
            total_amount: items.iter().map(|i| i.subtotal).sum(),
            total_items: items.iter().map(|i| u64::from(i.quantity)).sum(),
            items,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(item: i32, book: i32, price_minor: u32, quantity: u32) -> BagLine {
        BagLine {
            item_id: BagItemId::new(item),
            book_id: BookId::new(book),
            title: format!("Book {book}"),
            unit_price: Price::from_minor(price_minor),
            quantity,
            stock: 10,
            status: BookStatus::Active,
        }
    }

    #[test]
    fn test_view_totals_match_lines() {
        let lines = [line(1, 10, 1500, 2), line(2, 11, 250, 4)];
        let view = BagView::open(BagId::new(3), UserId::new(7), &lines);

        assert_eq!(view.total_items, 6);
        assert_eq!(view.total_amount, Price::from_minor(3000 + 1000));
        assert_eq!(view.items[1].subtotal, Price::from_minor(1000));
        assert!(view.is_active);
    }

    #[test]
    fn test_item_count_does_not_wrap() {
        let lines = [
            line(1, 10, 0, 2_000_000_000),
            line(2, 11, 0, 2_000_000_000),
            line(3, 12, 0, 2_000_000_000),
        ];
        let view = BagView::open(BagId::new(3), UserId::new(7), &lines);

        assert_eq!(view.total_items, 6_000_000_000);
        assert_eq!(view.total_amount, Price::ZERO);
    }

    #[test]
    fn test_empty_view() {
        let view = BagView::open(BagId::new(1), UserId::new(1), &[]);
        assert!(view.items.is_empty());
        assert_eq!(view.total_amount, Price::ZERO);
        assert_eq!(view.total_items, 0);
    }
}
