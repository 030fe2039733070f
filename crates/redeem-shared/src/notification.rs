//! Customer notification vocabulary.
//!
//! Five fixed kinds, each with a typed payload. Rendering is pure; the
//! server decides how (and whether) a rendered notification leaves the
//! process.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::SHORT_ORDER_ID_LEN;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderReceived,
    PaymentVerified,
    PaymentRejected,
    TicketReply,
    ReviewReceived,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderReceived => "order_received",
            Self::PaymentVerified => "payment_verified",
            Self::PaymentRejected => "payment_rejected",
            Self::TicketReply => "ticket_reply",
            Self::ReviewReceived => "review_received",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification with its payload. Serializes as `{"type": ..., "data": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Notification {
    OrderReceived {
        order_id: String,
        product_name: String,
        total: i64,
    },
    PaymentVerified {
        order_id: String,
        product_name: String,
    },
    PaymentRejected {
        order_id: String,
        reason: String,
    },
    TicketReply {
        subject: String,
        message: String,
    },
    ReviewReceived {
        product_name: String,
        rating: u8,
    },
}

impl Notification {
    pub fn order_received(order_id: &Uuid, product_name: &str, total: i64) -> Self {
        Self::OrderReceived {
            order_id: short_order_id(order_id),
            product_name: product_name.to_string(),
            total,
        }
    }

    pub fn payment_verified(order_id: &Uuid, product_name: &str) -> Self {
        Self::PaymentVerified {
            order_id: short_order_id(order_id),
            product_name: product_name.to_string(),
        }
    }

    pub fn payment_rejected(order_id: &Uuid, reason: &str) -> Self {
        Self::PaymentRejected {
            order_id: short_order_id(order_id),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::OrderReceived { .. } => NotificationKind::OrderReceived,
            Self::PaymentVerified { .. } => NotificationKind::PaymentVerified,
            Self::PaymentRejected { .. } => NotificationKind::PaymentRejected,
            Self::TicketReply { .. } => NotificationKind::TicketReply,
            Self::ReviewReceived { .. } => NotificationKind::ReviewReceived,
        }
    }

    pub fn subject(&self) -> String {
        match self {
            Self::OrderReceived { order_id, .. } => format!("Order #{order_id} Received"),
            Self::PaymentVerified { .. } => "Payment Verified - Your Redeem Codes Ready".to_string(),
            Self::PaymentRejected { .. } => "Payment Could Not Be Verified".to_string(),
            Self::TicketReply { subject, .. } => format!("Re: {subject}"),
            Self::ReviewReceived { .. } => "Thank You for Your Review".to_string(),
        }
    }

    /// HTML body. Every interpolated value is escaped.
    pub fn render_html(&self) -> String {
        match self {
            Self::OrderReceived {
                order_id,
                product_name,
                total,
            } => format!(
                "<h2>Order Received</h2>\n\
                 <p>Thank you for your order!</p>\n\
                 <p><strong>Order ID:</strong> {}</p>\n\
                 <p><strong>Product:</strong> {}</p>\n\
                 <p><strong>Total:</strong> {}</p>\n\
                 <p>Please upload your payment proof to verify your order.</p>",
                escape_html(order_id),
                escape_html(product_name),
                format_amount(*total),
            ),
            Self::PaymentVerified { order_id, .. } => format!(
                "<h2>Payment Verified</h2>\n\
                 <p>Your payment has been verified!</p>\n\
                 <p><strong>Order ID:</strong> {}</p>\n\
                 <p>Your redeem codes are ready. Check your orders dashboard to view them.</p>",
                escape_html(order_id),
            ),
            Self::PaymentRejected { reason, .. } => format!(
                "<h2>Payment Rejected</h2>\n\
                 <p>Your payment could not be verified.</p>\n\
                 <p><strong>Reason:</strong> {}</p>\n\
                 <p>Please upload your payment proof again.</p>",
                escape_html(reason),
            ),
            Self::TicketReply { subject, message } => format!(
                "<h2>New Reply to Your Ticket</h2>\n\
                 <p><strong>Subject:</strong> {}</p>\n\
                 <p>{}</p>",
                escape_html(subject),
                escape_html(message),
            ),
            Self::ReviewReceived {
                product_name,
                rating,
            } => format!(
                "<h2>Thank You for Your Review</h2>\n\
                 <p>We appreciate your feedback!</p>\n\
                 <p><strong>Product:</strong> {}</p>\n\
                 <p><strong>Rating:</strong> {} / 5 stars</p>",
                escape_html(product_name),
                rating,
            ),
        }
    }
}

pub fn short_order_id(id: &Uuid) -> String {
    id.to_string().chars().take(SHORT_ORDER_ID_LEN).collect()
}

/// `Rp 1.250.000` style grouping.
pub fn format_amount(amount: i64) -> String {
    let digits = amount.unsigned_abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }
    let sign = if amount < 0 { "-" } else { "" };
    format!("Rp {sign}{grouped}")
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_order_id() {
        let id = Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap();
        assert_eq!(short_order_id(&id), "1b4e28ba");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0), "Rp 0");
        assert_eq!(format_amount(999), "Rp 999");
        assert_eq!(format_amount(1_250_000), "Rp 1.250.000");
        assert_eq!(format_amount(-15_000), "Rp -15.000");
    }

    #[test]
    fn test_rejection_reason_is_escaped() {
        let n = Notification::payment_rejected(&Uuid::new_v4(), "<b>blurry</b> & cropped");
        let html = n.render_html();
        assert!(html.contains("&lt;b&gt;blurry&lt;/b&gt; &amp; cropped"));
        assert!(!html.contains("<b>"));
    }

    #[test]
    fn test_wire_shape() {
        let id = Uuid::parse_str("1b4e28ba-2fa1-11d2-883f-0016d3cca427").unwrap();
        let n = Notification::payment_verified(&id, "Steam 50k");
        assert_eq!(n.kind(), NotificationKind::PaymentVerified);

        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["type"], "payment_verified");
        assert_eq!(json["data"]["order_id"], "1b4e28ba");
        assert_eq!(json["data"]["product_name"], "Steam 50k");
    }

    #[test]
    fn test_every_kind_renders() {
        let id = Uuid::new_v4();
        let all = [
            Notification::order_received(&id, "Voucher", 10_000),
            Notification::payment_verified(&id, "Voucher"),
            Notification::payment_rejected(&id, "proof unreadable"),
            Notification::TicketReply {
                subject: "Code not working".into(),
                message: "Please retry".into(),
            },
            Notification::ReviewReceived {
                product_name: "Voucher".into(),
                rating: 5,
            },
        ];
        for n in &all {
            assert!(n.render_html().starts_with("<h2>"));
            assert!(!n.subject().is_empty());
        }
        assert!(all[0].render_html().contains("Rp 10.000"));
    }
}
