//! Reply text formatting

use std::ops::Bound;

use crate::catalog::{Book, PriceFilter};
use crate::dialogue::OrderDraft;

/// `120000` → `120.000 VND`
pub fn format_currency(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("{}{} VND", sign, grouped)
}

/// "dưới 100.000 VND", "từ 50.000 VND đến 150.000 VND", ...
pub fn price_range(filter: &PriceFilter) -> String {
    match (filter.min, filter.max) {
        (Bound::Included(lo), Bound::Included(hi)) => {
            format!("từ {} đến {}", format_currency(lo), format_currency(hi))
        }
        (Bound::Unbounded, Bound::Excluded(hi)) => format!("dưới {}", format_currency(hi)),
        (Bound::Unbounded, Bound::Included(hi)) => format!("tối đa {}", format_currency(hi)),
        (Bound::Excluded(lo), Bound::Unbounded) => format!("trên {}", format_currency(lo)),
        (Bound::Included(lo), Bound::Unbounded) => format!("từ {}", format_currency(lo)),
        (Bound::Unbounded, Bound::Unbounded) => "bất kỳ".to_string(),
        (min, max) => format!("{} - {}", bound_label(min), bound_label(max)),
    }
}

fn bound_label(bound: Bound<i64>) -> String {
    match bound {
        Bound::Included(n) | Bound::Excluded(n) => format_currency(n),
        Bound::Unbounded => "...".to_string(),
    }
}

/// Numbered listing under a header, cut at `max` entries.
pub fn book_list(header: &str, books: &[Book], max: usize) -> String {
    let mut out = format!("{}\n\n", header);
    for (i, book) in books.iter().take(max).enumerate() {
        out.push_str(&format!(
            "{}. {} - {} ({})\n",
            i + 1,
            book.title,
            book.author,
            format_currency(book.price)
        ));
    }
    if books.len() > max {
        out.push_str(&format!("\n... và còn {} sách khác.", books.len() - max));
    }
    out.trim_end().to_string()
}

pub fn book_info(book: &Book) -> String {
    let mut out = format!(
        "Thông tin sách '{}':\n• Tác giả: {}\n• Thể loại: {}\n• Giá: {}\n• Tồn kho: {} cuốn",
        book.title,
        book.author,
        book.category,
        format_currency(book.price),
        book.stock
    );
    if let Some(rating) = book.rating {
        out.push_str(&format!("\n• Đánh giá: {:.1}/5", rating));
    }
    out
}

pub fn stock_status(book: &Book) -> String {
    if book.in_stock() {
        format!("Sách '{}' còn {} cuốn trong kho.", book.title, book.stock)
    } else {
        format!("Sách '{}' đã hết hàng.", book.title)
    }
}

pub fn confirmation_prompt(draft: &OrderDraft) -> String {
    let phone = draft
        .phone
        .as_deref()
        .map(|p| format!(", SĐT: {}", p))
        .unwrap_or_default();
    format!(
        "Xác nhận đặt: '{}', SL: {}, Địa chỉ: {}{}. Tổng: {}. Trả lời 'có' để xác nhận hoặc 'không' để hủy.",
        draft.book.title,
        draft.quantity,
        draft.address,
        phone,
        format_currency(draft.total())
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_currency() {
        assert_eq!(format_currency(0), "0 VND");
        assert_eq!(format_currency(950), "950 VND");
        assert_eq!(format_currency(120_000), "120.000 VND");
        assert_eq!(format_currency(1_234_567), "1.234.567 VND");
        assert_eq!(format_currency(-5_000), "-5.000 VND");
    }

    #[test]
    fn test_price_range() {
        assert_eq!(price_range(&PriceFilter::below(100_000)), "dưới 100.000 VND");
        assert_eq!(price_range(&PriceFilter::above(200_000)), "trên 200.000 VND");
        assert_eq!(
            price_range(&PriceFilter::between(50_000, 150_000)),
            "từ 50.000 VND đến 150.000 VND"
        );
    }

    #[test]
    fn test_book_list_truncates() {
        let books: Vec<Book> = (1..=7)
            .map(|i| Book::new(format!("b{}", i), format!("Sách {}", i), "Tác giả", "Fiction", 10_000, 1))
            .collect();

        let text = book_list("Kết quả:", &books, 5);
        assert!(text.starts_with("Kết quả:\n\n1. Sách 1 - Tác giả (10.000 VND)"));
        assert!(text.contains("5. Sách 5"));
        assert!(!text.contains("6. Sách 6"));
        assert!(text.ends_with("... và còn 2 sách khác."));
    }

    #[test]
    fn test_stock_status() {
        let mut book = Book::new("b1", "Gilead", "Marilynne Robinson", "Fiction", 120_000, 3);
        assert_eq!(stock_status(&book), "Sách 'Gilead' còn 3 cuốn trong kho.");
        book.stock = 0;
        assert_eq!(stock_status(&book), "Sách 'Gilead' đã hết hàng.");
    }
}
