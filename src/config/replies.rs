//! Built-in reply texts
//!
//! Fixed Vietnamese strings the assistant answers with. Anything that depends
//! on catalog data is assembled in `core::format` instead.

use crate::nlp::Sentiment;

/// Pick one of several variants, rotating by turn so repeated greetings
/// don't read identically.
pub fn rotate(variants: &'static [&'static str], turn: usize) -> &'static str {
    variants[turn % variants.len()]
}

/// Fallback text for an utterance no rule understood.
pub fn unknown_for(sentiment: Sentiment) -> &'static str {
    match sentiment {
        Sentiment::Frustrated => builtin::UNKNOWN_FRUSTRATED,
        Sentiment::Negative => builtin::UNKNOWN_NEGATIVE,
        _ => builtin::UNKNOWN,
    }
}

/// Built-in replies that don't require files
pub mod builtin {
    pub const GREETINGS: &[&str] = &[
        "Xin chào! Tôi là trợ lý của cửa hàng sách. Tôi có thể giúp bạn tìm kiếm sách, tra cứu thông tin và đặt hàng. Bạn cần hỗ trợ gì?",
        "Chào bạn! Tôi có thể giúp bạn tìm sách, hỏi giá, đặt hàng hoặc gợi ý sách hay. Bạn muốn làm gì?",
        "Hello! Tôi là trợ lý ảo của cửa hàng sách. Có gì tôi có thể giúp bạn?",
    ];

    pub const GOODBYES: &[&str] = &[
        "Tạm biệt! Cảm ơn bạn đã ghé cửa hàng. Hẹn gặp lại!",
        "Chào tạm biệt! Nếu cần hỗ trợ thêm, bạn có thể quay lại bất cứ lúc nào.",
    ];

    pub const HELP: &str = r#"Tôi có thể giúp bạn:

Tìm kiếm sách:
• "Tìm sách Gilead"
• "Sách của Sidney Sheldon"
• "Sách về Fiction"

Tra cứu giá và tồn kho:
• "Giá sách Gilead"
• "Gilead còn hàng không?"
• "Sách dưới 100000"
• "Giá từ 50000 đến 150000"

Đặt hàng:
• "Đặt mua Gilead"
• Gõ "hủy" bất cứ lúc nào để hủy đơn đang đặt

Gợi ý:
• "Gợi ý sách hay"
• "Sách nào hay dưới 150000"

Thể loại:
• "Cửa hàng có những loại sách gì?""#;

    pub const UNKNOWN: &str = "Xin lỗi, tôi không hiểu yêu cầu của bạn. Bạn có thể thử:\n\n• 'Gợi ý sách hay'\n• 'Giá sách Gilead'\n• 'Đặt mua Gilead'\n• 'Cửa hàng có những loại sách gì?'\n\nHoặc gõ 'help' để xem hướng dẫn chi tiết.";

    pub const UNKNOWN_NEGATIVE: &str = "Xin lỗi vì sự bất tiện. Tôi sẽ cố gắng hiểu rõ hơn yêu cầu của bạn. Bạn có thể thử:\n\n• 'Gợi ý sách hay'\n• 'Giá sách Gilead'\n• 'Đặt mua Gilead'\n\nHoặc gõ 'help' để xem hướng dẫn chi tiết.";

    pub const UNKNOWN_FRUSTRATED: &str = "Tôi hiểu bạn đang gặp khó khăn. Đừng lo, tôi sẽ giúp bạn! Bạn có thể thử:\n\n• 'Gợi ý sách hay'\n• 'Giá sách Gilead'\n• 'Đặt mua Gilead'\n\nHoặc gõ 'help' để xem hướng dẫn chi tiết.";

    pub const NOTHING_TO_CANCEL: &str = "Bạn không có đơn hàng nào đang đặt.";
    pub const ORDER_CANCELLED: &str = "Đã hủy đơn hàng đang đặt.";
    pub const ORDER_DECLINED: &str = "Đã hủy đơn hàng.";
    pub const CONFIRM_REPROMPT: &str = "Vui lòng trả lời 'có' để xác nhận hoặc 'không' để hủy.";
    pub const ASK_BOOK_TO_ORDER: &str = "Bạn muốn đặt sách nào? (ví dụ: 'Đặt mua Gilead')";
    pub const STORE_UNAVAILABLE: &str = "Xin lỗi, hệ thống đang gặp sự cố. Vui lòng thử lại sau.";
    pub const NO_CATEGORIES: &str = "Cửa hàng chưa có thể loại sách nào.";
    pub const NO_RECOMMENDATIONS: &str = "Hiện chưa có sách nào để gợi ý.";

    pub const SUGGESTIONS: &[&str] = &[
        "Gợi ý sách hay",
        "Cửa hàng có những loại sách gì?",
        "Sách dưới 100000",
        "help",
    ];
}
