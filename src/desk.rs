//! Conversation handling for the chat front desk. Transport independent: it
//! takes decoded [`ChatEvent`]s and answers with [`DeskOutcome`]s that the
//! transport adapter turns into platform calls.

use tracing::{error, info};

use crate::{
    intake,
    models::BookingRecord,
    store::{RecordStore, DEFAULT_LATEST_LIMIT},
};

pub const ACTION_CHECKIN: &str = "CHECKIN";
pub const ACTION_INFO: &str = "INFO";
pub const ACTION_CONTACT: &str = "CONTACTO";
pub const COMMAND_LATEST: &str = "ultimas";

const WELCOME_TEXT: &str = "¡Bienvenido a NovaDesk! Soy tu recepción virtual.\nElige una opción:";

const CHECKIN_PROMPT: &str = "Para iniciar pre check-in, envíame en un solo mensaje tu *apellido y número de reserva*, por ejemplo:\n\n`Pérez 12345`";

const HOTEL_INFO_TEXT: &str = "Información del hotel:\n• Check-in: 15:00\n• Check-out: 12:00\n• Desayuno: 07:00–10:30\n• Wi-Fi: NovaDesk-Guest (clave: novadesk2025)";

const CONTACT_TEXT: &str =
    "Contacto recepción:\n• WhatsApp: +56 9 1234 5678\n• Email: recepcion@hotel-ejemplo.cl";

const NO_BOOKINGS_TEXT: &str = "Aún no hay reservas registradas.";
const QUERY_FAILED_TEXT: &str = "⚠️ Error al consultar.";
const INSERT_FAILED_TEXT: &str = "⚠️ Error al registrar. Inténtalo otra vez.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Start,
    Command { name: String },
    Text { text: String },
    Button { action_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyFormat {
    Plain,
    Markdown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuButton {
    pub label: &'static str,
    pub action_id: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub format: ReplyFormat,
    pub keyboard: Option<Vec<MenuButton>>,
}

impl Reply {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: ReplyFormat::Plain,
            keyboard: None,
        }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            format: ReplyFormat::Markdown,
            keyboard: None,
        }
    }

    pub fn with_keyboard(mut self, keyboard: Vec<MenuButton>) -> Self {
        self.keyboard = Some(keyboard);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeskOutcome {
    pub acknowledge_button: bool,
    pub replies: Vec<Reply>,
}

impl DeskOutcome {
    fn silent() -> Self {
        Self::default()
    }

    fn reply(reply: Reply) -> Self {
        Self {
            acknowledge_button: false,
            replies: vec![reply],
        }
    }

    fn button(reply: Option<Reply>) -> Self {
        Self {
            acknowledge_button: true,
            replies: reply.into_iter().collect(),
        }
    }
}

pub fn main_menu() -> Vec<MenuButton> {
    vec![
        MenuButton {
            label: "🛎️ Check-in",
            action_id: ACTION_CHECKIN,
        },
        MenuButton {
            label: "ℹ️ Info del hotel",
            action_id: ACTION_INFO,
        },
        MenuButton {
            label: "📞 Contacto",
            action_id: ACTION_CONTACT,
        },
    ]
}

/// Escapes the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[derive(Clone)]
pub struct Desk {
    store: RecordStore,
}

impl Desk {
    pub fn new(store: RecordStore) -> Self {
        Self { store }
    }

    pub async fn handle(&self, event: &ChatEvent) -> DeskOutcome {
        match event {
            ChatEvent::Start => {
                DeskOutcome::reply(Reply::plain(WELCOME_TEXT).with_keyboard(main_menu()))
            }
            ChatEvent::Button { action_id } => DeskOutcome::button(button_reply(action_id)),
            ChatEvent::Command { name } if name == COMMAND_LATEST => self.latest_bookings().await,
            ChatEvent::Command { .. } => DeskOutcome::silent(),
            ChatEvent::Text { text } => self.pre_checkin(text).await,
        }
    }

    async fn latest_bookings(&self) -> DeskOutcome {
        match self.store.latest(DEFAULT_LATEST_LIMIT).await {
            Ok(rows) if rows.is_empty() => DeskOutcome::reply(Reply::plain(NO_BOOKINGS_TEXT)),
            Ok(rows) => {
                let lines: Vec<String> = rows.iter().map(summary_line).collect();
                DeskOutcome::reply(Reply::plain(lines.join("\n")))
            }
            Err(err) => {
                error!("Failed listing latest bookings: {err}");
                DeskOutcome::reply(Reply::plain(QUERY_FAILED_TEXT))
            }
        }
    }

    async fn pre_checkin(&self, text: &str) -> DeskOutcome {
        let Some(draft) = intake::parse(text) else {
            return DeskOutcome::silent();
        };

        match self
            .store
            .insert(&draft.last_name, &draft.booking_number)
            .await
        {
            Ok(record) => {
                info!(id = record.id, "Pre check-in registered");
                DeskOutcome::reply(Reply::markdown(confirmation_text(&record)))
            }
            Err(err) => {
                error!("Failed registering pre check-in: {err}");
                DeskOutcome::reply(Reply::plain(INSERT_FAILED_TEXT))
            }
        }
    }
}

fn button_reply(action_id: &str) -> Option<Reply> {
    match action_id {
        ACTION_CHECKIN => Some(Reply::markdown(CHECKIN_PROMPT)),
        ACTION_INFO => Some(Reply::plain(HOTEL_INFO_TEXT)),
        ACTION_CONTACT => Some(Reply::plain(CONTACT_TEXT)),
        _ => None,
    }
}

fn confirmation_text(record: &BookingRecord) -> String {
    format!(
        "✅ *Pre check-in registrado*\nApellido: *{}*\nReserva: *{}*\nID: *{}*",
        escape_markdown(&record.last_name),
        escape_markdown(&record.booking_number),
        record.id
    )
}

fn summary_line(record: &BookingRecord) -> String {
    format!(
        "#{} — {} / {} · {}",
        record.id,
        record.last_name,
        record.booking_number,
        record.created_at.format("%d/%m/%Y %H:%M UTC")
    )
}
