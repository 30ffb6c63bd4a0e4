//! Inquire-based interactive driver over `ExporterApi`.
//!
//! Login (QR + optional cloud password), chat listing summary, selection, message cap,
//! export and final report.

use crate::domain::{ChatRecord, ChatType, DomainError};
use crate::ports::inbound::{ChatDescriptor, ExporterApi};
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, Styled};
use inquire::{CustomType, MultiSelect, Password, PasswordDisplayMode};
use qrcode::render::unicode;
use qrcode::QrCode;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

/// Applies prompt colors for all subsequent inquire prompts.
pub fn apply_theme() {
    let config = RenderConfig::default_colored()
        .with_prompt_prefix(Styled::new("?").with_fg(Color::LightCyan))
        .with_highlighted_option_prefix(Styled::new(">").with_fg(Color::LightGreen))
        .with_selected_checkbox(Styled::new("[x]").with_fg(Color::LightGreen));
    inquire::set_global_render_config(config);
}

fn chat_type_indicator(kind: ChatType) -> &'static str {
    match kind {
        ChatType::Private => "[U]",
        ChatType::Group => "[G]",
        ChatType::Supergroup => "[S]",
        ChatType::Channel => "[C]",
        ChatType::Unknown => "[?]",
    }
}

fn chat_label(chat: &ChatRecord) -> String {
    let forum = if chat.is_forum { " [forum]" } else { "" };
    format!(
        "{} {} ({}){}",
        chat_type_indicator(chat.chat_type),
        chat.title,
        chat.id,
        forum
    )
}

/// Chat counts per type, in display order; empty types omitted.
fn type_summary(chats: &[ChatRecord]) -> Vec<(ChatType, usize)> {
    [
        ChatType::Private,
        ChatType::Group,
        ChatType::Supergroup,
        ChatType::Channel,
        ChatType::Unknown,
    ]
    .into_iter()
    .map(|kind| (kind, chats.iter().filter(|c| c.chat_type == kind).count()))
    .filter(|(_, n)| *n > 0)
    .collect()
}

fn prompt_err(e: InquireError) -> DomainError {
    match e {
        InquireError::OperationCanceled | InquireError::OperationInterrupted => {
            DomainError::Cancelled
        }
        other => DomainError::Repo(format!("prompt: {}", other)),
    }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    app: Arc<dyn ExporterApi>,
    exports_dir: PathBuf,
    default_limit: usize,
}

impl TuiInputPort {
    pub fn new(app: Arc<dyn ExporterApi>, exports_dir: PathBuf, default_limit: usize) -> Self {
        Self {
            app,
            exports_dir,
            default_limit,
        }
    }

    /// Full interactive session.
    pub async fn run(&self) -> Result<(), DomainError> {
        self.login().await?;

        let chats = self.app.list_chats().await?;
        self.print_summary(&chats);
        if chats.is_empty() {
            println!("No chats found.");
            return Ok(());
        }

        let options: Vec<String> = chats.iter().map(chat_label).collect();
        let selected = MultiSelect::new("Select chats to export", options)
            .with_page_size(15)
            .raw_prompt()
            .map_err(prompt_err)?;
        if selected.is_empty() {
            println!("Nothing selected.");
            return Ok(());
        }
        let descriptors: Vec<ChatDescriptor> = selected
            .iter()
            .filter_map(|opt| chats.get(opt.index))
            .map(|c| ChatDescriptor {
                id: c.id,
                username: c.username.clone(),
            })
            .collect();

        let limit = CustomType::<usize>::new("Max messages per chat:")
            .with_default(self.default_limit)
            .with_error_message("Enter a non-negative whole number")
            .prompt()
            .map_err(prompt_err)?;

        let attempted = descriptors.len();
        let summary = self.app.export_chats(descriptors, limit).await?;

        println!();
        println!("Export finished");
        println!("  succeeded: {}", summary.succeeded);
        println!("  failed:    {}", summary.failed);
        println!("  attempted: {}", attempted);
        println!("  directory: {}", self.exports_dir.display());
        Ok(())
    }

    /// QR login loop. Shows a new URL on every token refresh; asks for the cloud password when needed.
    async fn login(&self) -> Result<(), DomainError> {
        let started = self.app.start_auth().await?;
        if started.authorized {
            println!("Already logged in.");
            return Ok(());
        }
        if let Some(url) = started.qr_url {
            print_qr_url(&url);
        }

        loop {
            let polled = self.app.poll_auth(None).await?;
            if polled.authorized {
                println!("Logged in.");
                return Ok(());
            }
            match polled.detail.as_deref() {
                Some("expired") => {
                    println!("QR code expired, here is a new one.");
                    if let Some(url) = polled.qr_url {
                        print_qr_url(&url);
                    }
                }
                Some("2fa_required") => return self.submit_password().await,
                Some(reason) => return Err(DomainError::Auth(reason.to_string())),
                None => {}
            }
        }
    }

    async fn submit_password(&self) -> Result<(), DomainError> {
        let password = Password::new("Two-factor password:")
            .without_confirmation()
            .with_display_mode(PasswordDisplayMode::Masked)
            .prompt()
            .map_err(prompt_err)?;
        let polled = self.app.poll_auth(Some(password)).await?;
        if polled.authorized {
            println!("Logged in.");
            Ok(())
        } else {
            Err(DomainError::Auth(
                polled.detail.unwrap_or_else(|| "password rejected".into()),
            ))
        }
    }

    fn print_summary(&self, chats: &[ChatRecord]) {
        let forums = chats.iter().filter(|c| c.is_forum).count();
        println!();
        println!("Found {} chats ({} with topics):", chats.len(), forums);
        for (kind, count) in type_summary(chats) {
            println!("  {:<11} {}", kind.as_str(), count);
        }
        info!(chats = chats.len(), forums, "chat list ready");
    }
}

/// Scannable QR code for `url`, two modules per character row.
fn render_qr(url: &str) -> Option<String> {
    let code = QrCode::new(url.as_bytes()).ok()?;
    Some(
        code.render::<unicode::Dense1x2>()
            .dark_color(unicode::Dense1x2::Light)
            .light_color(unicode::Dense1x2::Dark)
            .quiet_zone(true)
            .build(),
    )
}

fn print_qr_url(url: &str) {
    println!();
    println!("Scan this QR code on a logged-in device (Settings > Devices > Link Desktop Device):");
    match render_qr(url) {
        Some(qr) => println!("{}", qr),
        None => warn!("could not render QR code, use the link below"),
    }
    println!("  {}", url);
    println!();
}
