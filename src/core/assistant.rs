//! The assistant engine
//!
//! `Assistant::handle_utterance` is the single entry point. Per turn it:
//! 1. Loads (or starts) the caller's session
//! 2. Handles an explicit cancel utterance
//! 3. Routes the utterance to the open order dialogue, if any
//! 4. Otherwise classifies it, dispatches on the intent and updates the
//!    session's browsing context, which drives the reply suggestions
//! 5. Records both sides of the exchange in the session history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::catalog::{Book, Order};
use crate::config::{replies, replies_builtin, AssistantConfig};
use crate::dialogue::{
    self, AddressError, DialogueState, Event, OrderDialogue, OrderDraft, Outcome, QuantityError,
    Stage,
};
use crate::nlp::{BookMatcher, Classification, Intent, IntentClassifier, Sentiment};
use crate::session::{ConversationContext, Session, SessionInfo, SessionManager, SessionStats};
use crate::store::{BookStore, StoreError, StoreStats};

use super::format;

const MAX_SUGGESTIONS: usize = 5;

/// What the assistant says back
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reply {
    pub session_id: String,

    /// Text shown to the user
    pub message: String,

    pub intent: Intent,

    /// Dialogue stage after this turn
    pub stage: Stage,

    /// Books the message lists, in the same order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub books: Vec<Book>,

    /// Follow-up utterances the UI may offer as quick replies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,

    /// Set on the turn that placed an order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
}

/// Errors surfaced to the user within a turn. None of them end the session.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Book not found: {0}")]
    NotFound(String),

    #[error("Book out of stock: {0}")]
    OutOfStock(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(#[from] QuantityError),

    #[error("Invalid address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Unknown intent")]
    UnknownIntent,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(StoreError),
}

impl From<StoreError> for AssistantError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::BookNotFound(name) => AssistantError::NotFound(name),
            other => AssistantError::StoreUnavailable(other),
        }
    }
}

impl AssistantError {
    /// Vietnamese text for the user
    pub fn user_message(&self) -> String {
        match self {
            AssistantError::NotFound(name) => {
                format!("Không tìm thấy sách '{}'. Vui lòng kiểm tra lại tên sách.", name)
            }
            AssistantError::OutOfStock(title) => format!("Sách '{}' hiện đã hết hàng.", title),
            AssistantError::InvalidQuantity(QuantityError::NotANumber) => {
                "Vui lòng nhập số lượng hợp lệ (ví dụ: '2').".to_string()
            }
            AssistantError::InvalidQuantity(QuantityError::NotPositive(_)) => {
                "Số lượng phải lớn hơn 0. Vui lòng nhập lại (ví dụ: '2').".to_string()
            }
            AssistantError::InvalidQuantity(QuantityError::ExceedsStock { available, .. }) => {
                format!(
                    "Xin lỗi, sách chỉ còn {} cuốn. Vui lòng nhập số lượng không vượt quá {}.",
                    available, available
                )
            }
            AssistantError::InvalidAddress(AddressError::Empty) => {
                "Vui lòng nhập địa chỉ giao hàng (ví dụ: '123 Hà Nội, 0987654321').".to_string()
            }
            AssistantError::InvalidAddress(AddressError::MissingPhone) => {
                "Vui lòng nhập địa chỉ kèm số điện thoại (ví dụ: '123 Hà Nội, 0987654321')."
                    .to_string()
            }
            AssistantError::UnknownIntent => replies_builtin::UNKNOWN.to_string(),
            AssistantError::StoreUnavailable(_) => replies_builtin::STORE_UNAVAILABLE.to_string(),
        }
    }
}

/// Store and session numbers for the stats endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Statistics {
    pub store: StoreStats,
    pub sessions: SessionStats,
    pub timestamp: DateTime<Utc>,
}

/// Reply under construction; `session_id` and `stage` are filled in last.
struct Draft {
    message: String,
    intent: Intent,
    books: Vec<Book>,
    suggestions: Vec<String>,
    order: Option<Order>,
}

impl Draft {
    fn text(intent: Intent, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            intent,
            books: Vec::new(),
            suggestions: Vec::new(),
            order: None,
        }
    }

    fn error(intent: Intent, err: &AssistantError) -> Self {
        match err {
            AssistantError::StoreUnavailable(e) => {
                tracing::error!(error = %e, "store failure");
            }
            other => tracing::warn!(error = %other, "turn failed"),
        }
        Self::text(intent, err.user_message())
    }

    fn with_books(mut self, books: Vec<Book>) -> Self {
        self.books = books;
        self
    }

    fn with_suggestions<I, S>(mut self, suggestions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.suggestions = suggestions.into_iter().map(Into::into).collect();
        self
    }
}

pub struct Assistant {
    store: Arc<dyn BookStore>,
    sessions: Arc<SessionManager>,
    classifier: IntentClassifier,
    matcher: BookMatcher,
    dialogue: OrderDialogue,
    config: AssistantConfig,
}

impl Assistant {
    pub fn new(store: Arc<dyn BookStore>, config: AssistantConfig) -> Self {
        let sessions = Arc::new(SessionManager::new(
            config.session.timeout(),
            config.session.history_limit,
        ));
        Self {
            store,
            sessions,
            classifier: IntentClassifier::new(),
            matcher: BookMatcher::new(config.matching.fuzzy_threshold),
            dialogue: OrderDialogue::new(config.ordering.require_phone),
            config,
        }
    }

    pub fn store(&self) -> &Arc<dyn BookStore> {
        &self.store
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    /// Answer one utterance for one session.
    pub async fn handle_utterance(&self, session_id: &str, text: &str) -> Reply {
        let handle = self.sessions.get_or_create(session_id).await;
        let mut session = handle.lock().await;

        session.turns += 1;
        session.history.add_user(text);

        let draft = self.respond(&mut session, text).await;

        session.history.add_assistant(&draft.message);
        session.touch();

        Reply {
            session_id: session.id.clone(),
            message: draft.message,
            intent: draft.intent,
            stage: session.state.stage(),
            books: draft.books,
            suggestions: draft.suggestions,
            order: draft.order,
        }
    }

    pub async fn session_info(&self, session_id: &str) -> Option<SessionInfo> {
        self.sessions.info(session_id).await
    }

    pub async fn end_session(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).await
    }

    pub async fn statistics(&self) -> Result<Statistics, AssistantError> {
        let store = self
            .store
            .statistics()
            .await
            .map_err(AssistantError::StoreUnavailable)?;
        Ok(Statistics {
            store,
            sessions: self.sessions.stats().await,
            timestamp: Utc::now(),
        })
    }

    async fn respond(&self, session: &mut Session, text: &str) -> Draft {
        if dialogue::is_cancel(text) {
            let state = std::mem::take(&mut session.state);
            let transition = self.dialogue.transition(state, Event::Cancel);
            session.state = transition.to;
            let message = match transition.outcome {
                Outcome::Cancelled => replies_builtin::ORDER_CANCELLED,
                _ => replies_builtin::NOTHING_TO_CANCEL,
            };
            return Draft::text(Intent::Cancel, message);
        }

        if !session.state.is_idle() {
            return self.order_step(session, text).await;
        }

        let classification = self.classifier.classify(text);
        let intent = classification.intent;
        session.context.record_turn(intent, classification.sentiment);
        if let (Intent::PriceFilter | Intent::Recommend, Some(filter)) = (intent, classification.slots.price) {
            session.context.prefer_price(filter);
        }

        let mut draft = self.dispatch(session, classification).await;
        if !session.state.is_idle() {
            return draft;
        }

        if let Some(book) = draft.books.first() {
            match draft.intent {
                Intent::SearchByCategory => session.context.prefer_category(&book.category),
                Intent::SearchByAuthor => session.context.prefer_author(&book.author),
                _ => {}
            }
        }

        let mut extra = contextual_suggestions(&session.context, draft.intent);
        if matches!(draft.intent, Intent::Greeting | Intent::Help | Intent::Unknown) {
            extra.extend(replies_builtin::SUGGESTIONS.iter().map(|s| s.to_string()));
        }
        draft.suggestions = merge_suggestions(std::mem::take(&mut draft.suggestions), extra);
        draft
    }

    // ========== Order dialogue ==========

    async fn start_order(&self, session: &mut Session, fragment: Option<&str>) -> Draft {
        let Some(fragment) = fragment else {
            return Draft::text(Intent::OrderStart, replies_builtin::ASK_BOOK_TO_ORDER);
        };

        let book = match self.store.get_by_name(fragment, &self.matcher).await {
            Ok(book) => book,
            Err(e) => return Draft::error(Intent::OrderStart, &e.into()),
        };

        let state = std::mem::take(&mut session.state);
        let transition = self
            .dialogue
            .transition(state, Event::OrderRequested { book: book.clone() });
        session.state = transition.to;

        match transition.outcome {
            Outcome::Started => {
                tracing::info!(session_id = %session.id, book_id = %book.id, "order started");
                Draft::text(
                    Intent::OrderStart,
                    format!(
                        "Sách '{}' giá {} (còn {} cuốn). Vui lòng nhập số lượng.",
                        book.title,
                        format::format_currency(book.price),
                        book.stock
                    ),
                )
                .with_books(vec![book])
                .with_suggestions(["1", "2", "hủy"])
            }
            _ => Draft::error(Intent::OrderStart, &AssistantError::OutOfStock(book.title)),
        }
    }

    async fn order_step(&self, session: &mut Session, text: &str) -> Draft {
        let intent = Intent::OrderStepReply;

        // Stock may have moved since the order started.
        let available = match session.state.book() {
            Some(book) => match self.store.get_book(&book.id).await {
                Ok(current) => current.stock,
                Err(e) => {
                    session.state = DialogueState::Idle;
                    return Draft::error(intent, &e.into());
                }
            },
            None => 0,
        };

        let state = std::mem::take(&mut session.state);
        let transition = self
            .dialogue
            .transition(state, Event::StepReply { text, available });
        session.state = transition.to;

        match transition.outcome {
            Outcome::QuantityAccepted => match &session.state {
                DialogueState::AwaitingAddress { book, quantity } => Draft::text(
                    intent,
                    format!(
                        "Số lượng: {}. Tổng tiền: {}. Vui lòng nhập địa chỉ giao hàng và số điện thoại (ví dụ: '123 Hà Nội, 0987654321').",
                        quantity,
                        format::format_currency(book.price.saturating_mul(*quantity))
                    ),
                ),
                _ => Draft::text(intent, replies_builtin::CONFIRM_REPROMPT),
            },
            Outcome::InvalidQuantity(e) => Draft::error(intent, &e.into()),
            Outcome::AddressAccepted => match &session.state {
                DialogueState::AwaitingConfirmation { draft } => {
                    Draft::text(intent, format::confirmation_prompt(draft))
                        .with_suggestions(["có", "không"])
                }
                _ => Draft::text(intent, replies_builtin::CONFIRM_REPROMPT),
            },
            Outcome::InvalidAddress(e) => Draft::error(intent, &e.into()),
            Outcome::Confirmed(draft) => self.place_order(session, draft).await,
            Outcome::Declined => Draft::text(intent, replies_builtin::ORDER_DECLINED),
            Outcome::Reprompt => Draft::text(intent, replies_builtin::CONFIRM_REPROMPT)
                .with_suggestions(["có", "không"]),
            Outcome::Started
            | Outcome::OutOfStock
            | Outcome::Cancelled
            | Outcome::NothingToCancel
            | Outcome::Ignored => Draft::text(intent, replies_builtin::CONFIRM_REPROMPT),
        }
    }

    async fn place_order(&self, session: &mut Session, draft: OrderDraft) -> Draft {
        let intent = Intent::OrderStepReply;

        match self.store.create_order(draft.to_new_order()).await {
            Ok(order) => {
                let message = format!(
                    "Đơn hàng {} đã được tạo thành công! Tổng tiền: {}",
                    order.id,
                    format::format_currency(order.total_price)
                );
                let mut reply = Draft::text(intent, message);
                reply.order = Some(order);
                reply
            }
            Err(StoreError::InsufficientStock { available }) => {
                tracing::warn!(
                    session_id = %session.id,
                    book_id = %draft.book.id,
                    available,
                    "stock changed before confirmation"
                );
                let mut book = draft.book;
                book.stock = available;
                if available > 0 {
                    let message = format!(
                        "Xin lỗi, sách '{}' hiện chỉ còn {} cuốn. Vui lòng nhập lại số lượng.",
                        book.title, available
                    );
                    session.state = DialogueState::AwaitingQuantity { book };
                    Draft::text(intent, message)
                } else {
                    Draft::error(intent, &AssistantError::OutOfStock(book.title))
                }
            }
            Err(e) => Draft::error(intent, &e.into()),
        }
    }

    // ========== Intent dispatch ==========

    async fn dispatch(&self, session: &mut Session, c: Classification) -> Draft {
        let intent = c.intent;
        let slots = c.slots;
        let max = self.config.replies.max_results;

        let result: Result<Draft, AssistantError> = match intent {
            Intent::OrderStart => return self.start_order(session, slots.book.as_deref()).await,

            Intent::Search => match slots.query {
                Some(query) => self.search(&query).await,
                None => Ok(Draft::text(intent, "Vui lòng chỉ định tên sách cần tìm.")),
            },

            Intent::SearchByAuthor => match slots.author {
                Some(author) => self.store.books_by_author(&author).await.map_err(Into::into).map(
                    |books| {
                        listing(
                            intent,
                            books,
                            max,
                            format!("Sách của tác giả '{}':", author),
                            format!("Không tìm thấy sách nào của tác giả '{}'.", author),
                        )
                    },
                ),
                None => Ok(Draft::text(intent, "Vui lòng chỉ định tác giả (ví dụ: 'Sách của Sidney Sheldon').")),
            },

            Intent::SearchByCategory => match slots.category {
                Some(category) => self
                    .store
                    .books_by_category(&category)
                    .await
                    .map_err(Into::into)
                    .map(|books| {
                        listing(
                            intent,
                            books,
                            max,
                            format!("Sách thuộc thể loại '{}':", category),
                            format!("Không tìm thấy sách nào thuộc thể loại '{}'.", category),
                        )
                    }),
                None => Ok(Draft::text(intent, "Vui lòng chỉ định thể loại (ví dụ: 'Sách về Fiction').")),
            },

            Intent::PriceFilter => match slots.price {
                Some(filter) => self
                    .store
                    .filter_by_price(&filter)
                    .await
                    .map_err(Into::into)
                    .map(|books| {
                        let range = format::price_range(&filter);
                        listing(
                            intent,
                            books,
                            max,
                            format!("Sách có giá {}:", range),
                            format!("Không tìm thấy sách nào có giá {}.", range),
                        )
                    }),
                None => Ok(Draft::text(intent, "Vui lòng chỉ định khoảng giá (ví dụ: 'giá dưới 150000').")),
            },

            Intent::PriceLookup | Intent::StockLookup | Intent::InfoLookup => {
                self.lookup(intent, slots.book.as_deref()).await
            }

            Intent::Recommend => {
                let count = self.config.replies.recommend_count;
                self.store
                    .recommend(slots.price.as_ref(), count)
                    .await
                    .map_err(Into::into)
                    .map(|books| {
                        let (header, empty) = match &slots.price {
                            Some(filter) => {
                                let range = format::price_range(filter);
                                (
                                    format!("Gợi ý sách hay {}:", range),
                                    format!("Không tìm thấy sách nào để gợi ý trong khoảng giá {}.", range),
                                )
                            }
                            None => (
                                "Gợi ý sách hay:".to_string(),
                                replies_builtin::NO_RECOMMENDATIONS.to_string(),
                            ),
                        };
                        listing(intent, books, count, header, empty)
                    })
            }

            Intent::ListCategories => self
                .store
                .list_categories()
                .await
                .map_err(Into::into)
                .map(|categories| self.categories(categories)),

            Intent::Greeting => Ok(Draft::text(
                intent,
                replies::rotate(replies_builtin::GREETINGS, session.turns.saturating_sub(1)),
            )),

            Intent::Goodbye => Ok(Draft::text(
                intent,
                replies::rotate(replies_builtin::GOODBYES, session.turns.saturating_sub(1)),
            )),

            Intent::Help => Ok(Draft::text(intent, replies_builtin::HELP)),

            Intent::Unknown | Intent::OrderStepReply | Intent::Cancel => {
                tracing::debug!(text = %c.normalized, sentiment = ?c.sentiment, "{}", AssistantError::UnknownIntent);
                Ok(Draft::text(Intent::Unknown, replies::unknown_for(c.sentiment)))
            }
        };

        result.unwrap_or_else(|e| Draft::error(intent, &e))
    }

    /// Substring search, falling back to the closest fuzzy title.
    async fn search(&self, query: &str) -> Result<Draft, AssistantError> {
        let intent = Intent::Search;
        let mut books = self.store.search(query).await?;

        if books.is_empty() {
            match self.store.get_by_name(query, &self.matcher).await {
                Ok(book) => books.push(book),
                Err(StoreError::BookNotFound(_)) => {}
                Err(e) => return Err(e.into()),
            }
        }

        if books.is_empty() {
            return Ok(Draft::text(
                intent,
                format!("Không tìm thấy sách nào có tên chứa '{}'.", query),
            ));
        }

        let suggestions = vec![
            format!("Đặt mua {}", books[0].title),
            format!("Giá sách {}", books[0].title),
        ];
        let header = format!("Tìm thấy {} sách cho '{}':", books.len(), query);
        Ok(listing(intent, books, self.config.replies.max_results, header, String::new())
            .with_suggestions(suggestions))
    }

    async fn lookup(&self, intent: Intent, fragment: Option<&str>) -> Result<Draft, AssistantError> {
        let Some(fragment) = fragment else {
            return Ok(Draft::text(
                intent,
                "Không tìm thấy tên sách trong câu hỏi. Vui lòng thử lại (ví dụ: 'Giá sách Gilead').",
            ));
        };

        let book = self.store.get_by_name(fragment, &self.matcher).await?;
        let message = match intent {
            Intent::PriceLookup => format!(
                "Giá sách '{}': {}",
                book.title,
                format::format_currency(book.price)
            ),
            Intent::StockLookup => format::stock_status(&book),
            _ => format::book_info(&book),
        };

        let suggestions: Vec<String> = if book.in_stock() {
            vec![format!("Đặt mua {}", book.title)]
        } else {
            Vec::new()
        };
        Ok(Draft::text(intent, message)
            .with_books(vec![book])
            .with_suggestions(suggestions))
    }

    fn categories(&self, categories: Vec<String>) -> Draft {
        let intent = Intent::ListCategories;
        if categories.is_empty() {
            return Draft::text(intent, replies_builtin::NO_CATEGORIES);
        }

        let max = self.config.replies.max_categories;
        let mut message = String::from("Cửa hàng có các loại sách sau:\n\n");
        for category in categories.iter().take(max) {
            message.push_str(&format!("• {}\n", category));
        }
        if categories.len() > max {
            message.push_str(&format!("\n... và còn {} thể loại khác.", categories.len() - max));
        }

        let suggestions: Vec<String> = categories
            .iter()
            .take(3)
            .map(|c| format!("Sách về {}", c))
            .collect();
        Draft::text(intent, message.trim_end()).with_suggestions(suggestions)
    }
}

/// Follow-ups drawn from what the user browsed and how the conversation is going.
fn contextual_suggestions(context: &ConversationContext, intent: Intent) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    out.extend(context.preferred_categories.iter().take(2).map(|c| format!("Sách về {}", c)));
    out.extend(context.preferred_authors.iter().take(2).map(|a| format!("Sách của {}", a)));

    match intent {
        Intent::SearchByCategory => {
            out.extend(["Gợi ý sách hay", "Giá dưới 100000"].map(String::from));
        }
        Intent::SearchByAuthor => {
            out.extend(["Cửa hàng có những loại sách gì?", "Sách bán chạy"].map(String::from));
        }
        _ => {}
    }

    if let (Some(filter), false) = (&context.preferred_price, intent == Intent::PriceFilter) {
        out.push(format!("Gợi ý sách {}", format::price_range(filter)));
    }

    match context.last_sentiment() {
        Some(Sentiment::Frustrated) => {
            out.extend(["Hướng dẫn sử dụng", "Cửa hàng có những loại sách gì?"].map(String::from));
        }
        Some(Sentiment::Excited) => out.push("Gợi ý sách hay".to_string()),
        _ => {}
    }
    out
}

/// Turn-specific suggestions first, then the rest, without duplicates.
fn merge_suggestions(primary: Vec<String>, extra: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::with_capacity(MAX_SUGGESTIONS);
    for suggestion in primary.into_iter().chain(extra) {
        if merged.len() == MAX_SUGGESTIONS {
            break;
        }
        if !merged.contains(&suggestion) {
            merged.push(suggestion);
        }
    }
    merged
}

fn listing(intent: Intent, books: Vec<Book>, max: usize, header: String, empty: String) -> Draft {
    if books.is_empty() {
        return Draft::text(intent, empty);
    }
    let message = format::book_list(&header, &books, max);
    let shown: Vec<Book> = books.into_iter().take(max).collect();
    Draft::text(intent, message).with_books(shown)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::query::fixtures::sample_books;
    use crate::catalog::{NewOrder, OrderStatus};
    use crate::store::{SqliteStore, StoreResult};
    use async_trait::async_trait;
    use tokio_test::assert_ok;

    async fn seeded_store() -> Arc<SqliteStore> {
        let store = SqliteStore::new_in_memory_async().await.unwrap();
        store.insert_books(&sample_books()).await.unwrap();
        Arc::new(store)
    }

    async fn assistant_with(config: AssistantConfig) -> (Assistant, Arc<SqliteStore>) {
        let store = seeded_store().await;
        let assistant = Assistant::new(store.clone(), config);
        (assistant, store)
    }

    async fn assistant() -> (Assistant, Arc<SqliteStore>) {
        assistant_with(AssistantConfig::default()).await
    }

    #[tokio::test]
    async fn test_full_order_scenario() {
        let (bot, store) = assistant().await;

        let reply = bot.handle_utterance("s1", "Đặt mua Gilead").await;
        assert_eq!(reply.intent, Intent::OrderStart);
        assert_eq!(reply.stage, Stage::AwaitingQuantity);
        let info = bot.session_info("s1").await.unwrap();
        assert_eq!(info.state.book().unwrap().id, "b1");

        let reply = bot.handle_utterance("s1", "2").await;
        assert_eq!(reply.intent, Intent::OrderStepReply);
        assert_eq!(reply.stage, Stage::AwaitingAddress);
        assert!(reply.message.contains("240.000 VND"));

        let reply = bot.handle_utterance("s1", "123 Hà Nội, 0987654321").await;
        assert_eq!(reply.stage, Stage::AwaitingConfirmation);
        assert!(reply.message.contains("SĐT: 0987654321"));

        let reply = bot.handle_utterance("s1", "đồng ý").await;
        assert_eq!(reply.stage, Stage::Idle);
        let order = reply.order.expect("order placed");
        assert_eq!(order.quantity, 2);
        assert_eq!(order.address, "123 Hà Nội, 0987654321");
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(reply.message.contains(&order.id));

        assert_eq!(store.get_book("b1").await.unwrap().stock, 8);
        assert_eq!(store.orders_by_phone("0987654321").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_quantity_above_stock_keeps_waiting() {
        let (bot, store) = assistant().await;

        bot.handle_utterance("s1", "Đặt mua Rage of Angels").await;
        let reply = bot.handle_utterance("s1", "5").await;
        assert_eq!(reply.stage, Stage::AwaitingQuantity);
        assert!(reply.message.contains("chỉ còn 4 cuốn"));

        let reply = bot.handle_utterance("s1", "không biết").await;
        assert_eq!(reply.stage, Stage::AwaitingQuantity);
        assert!(reply.message.contains("số lượng hợp lệ"));

        let reply = bot.handle_utterance("s1", "0").await;
        assert_eq!(reply.stage, Stage::AwaitingQuantity);

        assert_eq!(store.statistics().await.unwrap().orders, 0);
        assert_eq!(store.get_book("b2").await.unwrap().stock, 4);
    }

    #[tokio::test]
    async fn test_open_order_captures_every_utterance() {
        let (bot, _) = assistant().await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        let reply = bot.handle_utterance("s1", "Giá dưới 100000").await;
        assert_eq!(reply.intent, Intent::OrderStepReply);
        assert_eq!(reply.stage, Stage::AwaitingQuantity);
        assert!(reply.books.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let (bot, _) = assistant().await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        bot.handle_utterance("s1", "1").await;

        let reply = bot.handle_utterance("s1", "Hủy").await;
        assert_eq!(reply.intent, Intent::Cancel);
        assert_eq!(reply.stage, Stage::Idle);
        assert_eq!(reply.message, replies_builtin::ORDER_CANCELLED);
        assert!(bot.session_info("s1").await.unwrap().state.is_idle());

        let reply = bot.handle_utterance("s1", "hủy").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert_eq!(reply.message, replies_builtin::NOTHING_TO_CANCEL);
    }

    #[tokio::test]
    async fn test_decline_at_confirmation() {
        let (bot, store) = assistant().await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        bot.handle_utterance("s1", "1").await;
        bot.handle_utterance("s1", "12 Lê Lợi").await;

        let reply = bot.handle_utterance("s1", "để mình nghĩ thêm").await;
        assert_eq!(reply.stage, Stage::AwaitingConfirmation);

        let reply = bot.handle_utterance("s1", "không").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert!(reply.order.is_none());
        assert_eq!(store.get_book("b1").await.unwrap().stock, 10);
    }

    #[tokio::test]
    async fn test_stock_drop_before_confirmation() {
        let (bot, store) = assistant().await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        bot.handle_utterance("s1", "3").await;
        bot.handle_utterance("s1", "123 Hà Nội").await;

        store.update_stock("b1", 1).await.unwrap();
        let reply = bot.handle_utterance("s1", "có").await;
        assert_eq!(reply.stage, Stage::AwaitingQuantity);
        assert!(reply.message.contains("chỉ còn 1 cuốn"));
        assert!(reply.order.is_none());
        assert_eq!(store.get_book("b1").await.unwrap().stock, 1);
    }

    #[tokio::test]
    async fn test_out_of_stock_and_unknown_book() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Đặt mua Nhà giả kim").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert!(reply.message.contains("hết hàng"));

        let reply = bot.handle_utterance("s1", "Đặt mua xyzzy").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert!(reply.message.contains("Không tìm thấy sách"));

        let reply = bot.handle_utterance("s1", "đặt hàng").await;
        assert_eq!(reply.message, replies_builtin::ASK_BOOK_TO_ORDER);
    }

    #[tokio::test]
    async fn test_search_scenario() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Tìm sách Gilead").await;
        assert_eq!(reply.intent, Intent::Search);
        assert_eq!(reply.books[0].title, "Gilead");
        assert!(reply.message.contains("Gilead"));

        let reply = bot.handle_utterance("s1", "Tìm sách Gileed").await;
        assert_eq!(reply.books.len(), 1);
        assert_eq!(reply.books[0].title, "Gilead");

        let reply = bot.handle_utterance("s1", "Tìm sách xyzzy").await;
        assert!(reply.books.is_empty());
        assert!(reply.message.contains("Không tìm thấy"));
    }

    #[tokio::test]
    async fn test_price_filter_scenario() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Giá dưới 100000").await;
        assert_eq!(reply.intent, Intent::PriceFilter);
        assert!(!reply.books.is_empty());
        assert!(reply.books.iter().all(|b| b.price < 100_000));

        let prices: Vec<i64> = reply.books.iter().map(|b| b.price).collect();
        let mut sorted = prices.clone();
        sorted.sort();
        assert_eq!(prices, sorted);
        assert!(reply.message.contains("dưới 100.000 VND"));
    }

    #[tokio::test]
    async fn test_lookups() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Giá sách Gilead").await;
        assert_eq!(reply.message, "Giá sách 'Gilead': 120.000 VND");

        let reply = bot.handle_utterance("s1", "Gilead còn hàng không?").await;
        assert_eq!(reply.message, "Sách 'Gilead' còn 10 cuốn trong kho.");
        assert_eq!(reply.suggestions, vec!["Đặt mua Gilead".to_string()]);

        let reply = bot.handle_utterance("s1", "Thông tin về sách Gilead").await;
        assert!(reply.message.contains("Marilynne Robinson"));

        let reply = bot.handle_utterance("s1", "Giá sách xyzzy").await;
        assert!(reply.message.contains("Không tìm thấy sách"));
    }

    #[tokio::test]
    async fn test_recommend_and_categories() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Gợi ý sách hay").await;
        let titles: Vec<&str> = reply.books.iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["Rage of Angels", "Gilead", "Spiritual Leadership"]);

        let reply = bot.handle_utterance("s1", "Sách nào hay dưới 100000").await;
        assert_eq!(reply.intent, Intent::Recommend);
        assert!(reply.books.iter().all(|b| b.price < 100_000 && b.stock > 0));

        let reply = bot.handle_utterance("s1", "Cửa hàng có những loại sách gì?").await;
        assert_eq!(reply.intent, Intent::ListCategories);
        assert!(reply.message.contains("• Fiction"));
        assert!(reply.message.contains("• Kỹ năng sống"));
    }

    #[tokio::test]
    async fn test_small_talk() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Xin chào").await;
        assert_eq!(reply.intent, Intent::Greeting);
        assert_eq!(reply.message, replies_builtin::GREETINGS[0]);

        let reply = bot.handle_utterance("s1", "asdfgh").await;
        assert_eq!(reply.intent, Intent::Unknown);
        assert_eq!(reply.message, replies_builtin::UNKNOWN);

        let reply = bot.handle_utterance("s1", "help").await;
        assert_eq!(reply.message, replies_builtin::HELP);
    }

    #[tokio::test]
    async fn test_suggestions_follow_browsing_context() {
        let (bot, _) = assistant().await;

        let reply = bot.handle_utterance("s1", "Xin chào").await;
        assert_eq!(reply.suggestions[0], replies_builtin::SUGGESTIONS[0]);

        let reply = bot.handle_utterance("s1", "Sách về Fiction").await;
        assert_eq!(reply.intent, Intent::SearchByCategory);
        assert_eq!(reply.suggestions[0], "Sách về Fiction");
        assert!(reply.suggestions.contains(&"Gợi ý sách hay".to_string()));

        bot.handle_utterance("s1", "Sách của Sidney Sheldon").await;
        let reply = bot.handle_utterance("s1", "Xin chào").await;
        assert_eq!(
            reply.suggestions[..2],
            ["Sách về Fiction".to_string(), "Sách của Sidney Sheldon".to_string()]
        );
        assert_eq!(reply.suggestions.len(), MAX_SUGGESTIONS);

        let info = bot.session_info("s1").await.unwrap();
        assert_eq!(info.context.preferred_categories, vec!["Fiction".to_string()]);
        assert_eq!(info.context.current_topic.as_deref(), Some("Sidney Sheldon"));

        // other sessions start with a clean slate
        let reply = bot.handle_utterance("s2", "Xin chào").await;
        assert!(!reply.suggestions.contains(&"Sách về Fiction".to_string()));
    }

    #[tokio::test]
    async fn test_price_preference_is_suggested() {
        let (bot, _) = assistant().await;

        bot.handle_utterance("s1", "Giá dưới 100000").await;
        let reply = bot.handle_utterance("s1", "help").await;
        assert!(reply
            .suggestions
            .contains(&"Gợi ý sách dưới 100.000 VND".to_string()));
    }

    #[tokio::test]
    async fn test_sessions_are_isolated() {
        let (bot, _) = assistant().await;

        bot.handle_utterance("alice", "Đặt mua Gilead").await;
        let reply = bot.handle_utterance("bob", "2").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert_eq!(reply.intent, Intent::Unknown);

        let alice = bot.session_info("alice").await.unwrap();
        assert_eq!(alice.stage, Stage::AwaitingQuantity);
    }

    #[tokio::test]
    async fn test_expired_session_drops_draft() {
        let mut config = AssistantConfig::default();
        config.session.timeout_secs = 0;
        let (bot, _) = assistant_with(config).await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        let reply = bot.handle_utterance("s1", "2").await;
        assert_eq!(reply.stage, Stage::Idle);
        assert_ne!(reply.intent, Intent::OrderStepReply);
    }

    #[tokio::test]
    async fn test_require_phone() {
        let mut config = AssistantConfig::default();
        config.ordering.require_phone = true;
        let (bot, _) = assistant_with(config).await;

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        bot.handle_utterance("s1", "1").await;
        let reply = bot.handle_utterance("s1", "123 Hà Nội").await;
        assert_eq!(reply.stage, Stage::AwaitingAddress);
        assert!(reply.message.contains("số điện thoại"));
    }

    #[tokio::test]
    async fn test_concurrent_confirmations_never_oversell() {
        let (bot, store) = assistant().await;

        // b5 has 2 copies
        for id in ["a", "b"] {
            bot.handle_utterance(id, "Đặt mua The Other Side of Midnight").await;
            bot.handle_utterance(id, "2").await;
            bot.handle_utterance(id, "1 Nguyễn Huệ").await;
        }

        let (a, b) = tokio::join!(
            bot.handle_utterance("a", "đồng ý"),
            bot.handle_utterance("b", "đồng ý")
        );

        let placed = [&a, &b].iter().filter(|r| r.order.is_some()).count();
        assert_eq!(placed, 1);
        assert_eq!(store.get_book("b5").await.unwrap().stock, 0);
    }

    #[tokio::test]
    async fn test_history_and_stats() {
        let (bot, _) = assistant().await;

        bot.handle_utterance("s1", "Xin chào").await;
        bot.handle_utterance("s1", "Đặt mua Gilead").await;

        let info = bot.session_info("s1").await.unwrap();
        assert_eq!(info.message_count, 4);
        assert_eq!(info.turns, 2);

        let stats = assert_ok!(bot.statistics().await);
        assert_eq!(stats.store.books, 6);
        assert_eq!(stats.sessions.active_sessions, 1);
        assert_eq!(stats.sessions.ordering_sessions, 1);

        assert!(bot.end_session("s1").await);
        assert!(bot.session_info("s1").await.is_none());
    }

    /// Delegates to SQLite but refuses to place orders.
    struct BrokenOrders(SqliteStore);

    #[async_trait]
    impl BookStore for BrokenOrders {
        async fn all_books(&self) -> StoreResult<Vec<Book>> {
            self.0.all_books().await
        }

        async fn get_book(&self, id: &str) -> StoreResult<Book> {
            self.0.get_book(id).await
        }

        async fn insert_books(&self, books: &[Book]) -> StoreResult<usize> {
            self.0.insert_books(books).await
        }

        async fn update_stock(&self, book_id: &str, stock: i64) -> StoreResult<()> {
            self.0.update_stock(book_id, stock).await
        }

        async fn create_order(&self, _order: NewOrder) -> StoreResult<Order> {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }

        async fn get_order(&self, id: &str) -> StoreResult<Order> {
            self.0.get_order(id).await
        }

        async fn update_order_status(&self, id: &str, status: OrderStatus) -> StoreResult<()> {
            self.0.update_order_status(id, status).await
        }

        async fn orders_by_phone(&self, phone: &str) -> StoreResult<Vec<Order>> {
            self.0.orders_by_phone(phone).await
        }

        async fn statistics(&self) -> StoreResult<StoreStats> {
            self.0.statistics().await
        }
    }

    #[tokio::test]
    async fn test_store_failure_resets_dialogue() {
        let inner = SqliteStore::new_in_memory_async().await.unwrap();
        inner.insert_books(&sample_books()).await.unwrap();
        let store = Arc::new(BrokenOrders(inner));
        let bot = Assistant::new(store.clone(), AssistantConfig::default());

        bot.handle_utterance("s1", "Đặt mua Gilead").await;
        bot.handle_utterance("s1", "1").await;
        bot.handle_utterance("s1", "123 Hà Nội").await;
        let reply = bot.handle_utterance("s1", "ok").await;

        assert_eq!(reply.stage, Stage::Idle);
        assert_eq!(reply.message, replies_builtin::STORE_UNAVAILABLE);
        assert_eq!(store.get_book("b1").await.unwrap().stock, 10);

        // the session keeps working
        let reply = bot.handle_utterance("s1", "Tìm sách Gilead").await;
        assert_eq!(reply.books[0].id, "b1");
    }

    #[test]
    fn test_error_messages() {
        let err: AssistantError = StoreError::BookNotFound("abc".into()).into();
        assert!(matches!(err, AssistantError::NotFound(_)));
        assert!(err.user_message().contains("'abc'"));

        let err = AssistantError::from(QuantityError::ExceedsStock {
            requested: 5,
            available: 2,
        });
        assert!(err.user_message().contains("chỉ còn 2 cuốn"));
    }
}
