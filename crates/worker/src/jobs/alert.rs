use std::sync::Arc;

use chrono::SecondsFormat;
use notice_core::config::TelegramSettings;
use notice_core::types::ReportType;
use notice_db::models::Report;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::telegram::{ChatSender, SendMessage};

const NO_DESCRIPTION: &str = "No description provided";

#[derive(Clone)]
pub struct AlertContext {
    pub sender: Arc<dyn ChatSender>,
    pub telegram: TelegramSettings,
}

/// Run [`post`] on its own task. Callers normally drop the handle.
pub fn spawn(ctx: Arc<AlertContext>, report: Report) -> JoinHandle<bool> {
    tokio::spawn(async move { post(&ctx, &report).await })
}

/// Announce `report` in the configured chat. Returns whether Telegram
/// accepted the message; failures are only logged.
pub async fn post(ctx: &AlertContext, report: &Report) -> bool {
    let message = SendMessage::markdown(&ctx.telegram.chat_id, format_message(report));

    match ctx.sender.send_message(&ctx.telegram.bot_token, &message).await {
        Ok(response) if response.status == 200 => {
            info!(report_id = %report.id, "channel alert sent");
            true
        }
        Ok(response) => {
            warn!(
                report_id = %report.id,
                status = response.status,
                body = %response.body,
                "telegram rejected channel alert"
            );
            false
        }
        Err(err) => {
            warn!(report_id = %report.id, error = %err, "channel alert failed");
            false
        }
    }
}

pub fn format_message(report: &Report) -> String {
    let (icon, label) = match report.kind.parse::<ReportType>() {
        Ok(kind) => (kind.icon(), kind.label().to_string()),
        Err(_) => ("📍", report.kind.clone()),
    };
    let description = report
        .description
        .as_deref()
        .filter(|d| !d.is_empty())
        .unwrap_or(NO_DESCRIPTION);
    let (lat, long) = (report.lat, report.long);
    let map_link = format!("https://www.openstreetmap.org/?mlat={lat}&mlon={long}#map=17/{lat}/{long}");
    let created_at =
        notice_db::from_millis(report.created_at).to_rfc3339_opts(SecondsFormat::Millis, true);

    format!(
        "{icon} *{label}*\n\n📝 {description}\n\n📍 [View Location]({map_link})\n🗺️ Geohash: `{}`\n⏰ {created_at}",
        report.geohash
    )
}
