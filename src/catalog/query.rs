//! Read-only queries over an in-memory slice of books
//!
//! Every ordering here is total (ties fall back to title, then id), so the
//! same catalog always produces the same listing.

use std::cmp::Ordering;

use super::{Book, PriceFilter};
use crate::nlp::text::normalize;

/// How well a book matched a free-text search; lower is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Relevance {
    ExactTitle,
    TitlePrefix,
    TitleContains,
    AuthorContains,
    CategoryContains,
}

fn relevance(book: &Book, needle: &str) -> Option<Relevance> {
    let title = normalize(&book.title);
    if title == needle {
        return Some(Relevance::ExactTitle);
    }
    if title.starts_with(needle) {
        return Some(Relevance::TitlePrefix);
    }
    if title.contains(needle) {
        return Some(Relevance::TitleContains);
    }
    if normalize(&book.author).contains(needle) {
        return Some(Relevance::AuthorContains);
    }
    if normalize(&book.category).contains(needle) {
        return Some(Relevance::CategoryContains);
    }
    None
}

fn by_title(a: &Book, b: &Book) -> Ordering {
    a.title
        .to_lowercase()
        .cmp(&b.title.to_lowercase())
        .then_with(|| a.id.cmp(&b.id))
}

/// Case and diacritic-insensitive substring search over title, author and
/// category, ordered by relevance then title.
pub fn search(books: &[Book], text: &str) -> Vec<Book> {
    let needle = normalize(text);
    if needle.is_empty() {
        return Vec::new();
    }

    let mut hits: Vec<(Relevance, &Book)> = books
        .iter()
        .filter_map(|b| relevance(b, &needle).map(|r| (r, b)))
        .collect();

    hits.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| by_title(a, b)));
    hits.into_iter().map(|(_, b)| b.clone()).collect()
}

/// Books inside the price window, cheapest first.
pub fn filter_by_price(books: &[Book], filter: &PriceFilter) -> Vec<Book> {
    let mut hits: Vec<Book> = books
        .iter()
        .filter(|b| filter.contains(b.price))
        .cloned()
        .collect();
    hits.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| by_title(a, b)));
    hits
}

/// Books whose author contains the fragment.
pub fn by_author(books: &[Book], fragment: &str) -> Vec<Book> {
    by_field(books, fragment, |b| &b.author)
}

/// Books whose category contains the fragment.
pub fn by_category(books: &[Book], fragment: &str) -> Vec<Book> {
    by_field(books, fragment, |b| &b.category)
}

fn by_field<F>(books: &[Book], fragment: &str, field: F) -> Vec<Book>
where
    F: Fn(&Book) -> &str,
{
    let needle = normalize(fragment);
    if needle.is_empty() {
        return Vec::new();
    }
    let mut hits: Vec<Book> = books
        .iter()
        .filter(|b| normalize(field(b)).contains(&needle))
        .cloned()
        .collect();
    hits.sort_by(by_title);
    hits
}

/// Recommendation policy: in-stock books inside the optional price window,
/// best rated first (unrated last), then cheapest, then title.
pub fn recommend(books: &[Book], filter: Option<&PriceFilter>, limit: usize) -> Vec<Book> {
    let mut picks: Vec<&Book> = books
        .iter()
        .filter(|b| b.in_stock())
        .filter(|b| filter.map_or(true, |f| f.contains(b.price)))
        .collect();

    picks.sort_by(|a, b| {
        let rating = match (a.rating, b.rating) {
            (Some(x), Some(y)) => y.total_cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        rating
            .then_with(|| a.price.cmp(&b.price))
            .then_with(|| by_title(a, b))
    });

    picks.into_iter().take(limit).cloned().collect()
}

/// Distinct categories, sorted.
pub fn categories(books: &[Book]) -> Vec<String> {
    let mut cats: Vec<String> = books.iter().map(|b| b.category.trim().to_string()).collect();
    cats.retain(|c| !c.is_empty());
    cats.sort_by_key(|c| c.to_lowercase());
    cats.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());
    cats
}


#[cfg(test)]
mod tests {
    use super::fixtures::sample_books;
    use super::*;

    fn titles(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.title.as_str()).collect()
    }

    #[test]
    fn test_search_ranks_title_before_author() {
        let books = sample_books();
        let hits = search(&books, "sheldon");
        assert_eq!(titles(&hits), vec!["Rage of Angels", "The Other Side of Midnight"]);

        let hits = search(&books, "gilead");
        assert_eq!(titles(&hits), vec!["Gilead"]);
    }

    #[test]
    fn test_search_ignores_diacritics() {
        let books = sample_books();
        assert_eq!(titles(&search(&books, "nha gia kim")), vec!["Nhà Giả Kim"]);
        assert_eq!(titles(&search(&books, "ĐẮC NHÂN")), vec!["Đắc Nhân Tâm"]);
        assert!(search(&books, "   ").is_empty());
    }

    #[test]
    fn test_filter_by_price_is_strict_and_sorted() {
        let books = sample_books();
        let hits = filter_by_price(&books, &PriceFilter::below(95_000));
        assert_eq!(titles(&hits), vec!["Spiritual Leadership", "Nhà Giả Kim", "Đắc Nhân Tâm"]);
        assert!(hits.iter().all(|b| b.price < 95_000));
    }

    #[test]
    fn test_recommend_policy() {
        let books = sample_books();
        // Nhà Giả Kim has the best rating but is out of stock.
        let picks = recommend(&books, None, 3);
        assert_eq!(titles(&picks), vec!["Rage of Angels", "Gilead", "Spiritual Leadership"]);

        let cheap = PriceFilter::below(100_000);
        let picks = recommend(&books, Some(&cheap), 5);
        assert_eq!(titles(&picks), vec!["Rage of Angels", "Spiritual Leadership", "Đắc Nhân Tâm"]);
    }

    #[test]
    fn test_by_author_and_category() {
        let books = sample_books();
        assert_eq!(by_author(&books, "sidney sheldon").len(), 2);
        assert_eq!(titles(&by_category(&books, "ky nang")), vec!["Đắc Nhân Tâm"]);
    }

    #[test]
    fn test_categories_are_distinct_and_sorted() {
        let books = sample_books();
        assert_eq!(
            categories(&books),
            vec!["Christian Life", "Fiction", "Kỹ năng sống", "Tiểu thuyết"]
        );
    }
}
