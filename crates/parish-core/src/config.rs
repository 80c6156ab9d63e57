//! Environment Configuration
//!
//! Read once at startup into explicit values passed down to the flows,
//! instead of ad-hoc `env::var` calls at each decision point. Credentials
//! stay optional: an absent key disables the client built from it.

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_or(key: &str, default: &str) -> String {
    env_opt(key).unwrap_or_else(|| default.to_owned())
}

/// Field names and fixed values of the registration table.
#[derive(Clone, Debug)]
pub struct StoreSchema {
    /// Record store base holding the registration table
    pub base_id: String,

    /// Table of event registrations
    pub table: String,

    /// Field carrying the human-assigned registration id
    pub search_field: String,

    pub status_field: String,
    pub email_field: String,

    /// The intake form has written the attendee name under both of these
    pub name_field: String,
    pub name_field_alt: String,

    pub tags_field: String,

    /// Field updated with the generated payment link
    pub link_field: String,

    /// Status written after a confirmed payment
    pub paid_status: String,

    /// Status written for payment-exempt registrations
    pub exempt_status: String,

    /// Sentinel tag: payment-confirmation email already sent
    pub payment_email_tag: String,

    /// Sentinel tag: registration (payment-link) email already sent
    pub registration_email_tag: String,

    /// Greeting used when the record has no name at all
    pub fallback_user_name: String,
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self {
            base_id: "app1w80Zv4Vo2FUdN".into(),
            table: "Inscritos".into(),
            search_field: "Id da Inscrição".into(),
            status_field: "Status".into(),
            email_field: "Email".into(),
            name_field: "Nome".into(),
            name_field_alt: "name".into(),
            tags_field: "Tags".into(),
            link_field: "Link de Pagamento".into(),
            paid_status: "Pago".into(),
            exempt_status: "Isenta".into(),
            payment_email_tag: "email-pagamento".into(),
            registration_email_tag: "email-inscricao".into(),
            fallback_user_name: "Usuário".into(),
        }
    }
}

/// The event registrations are being sold for.
#[derive(Clone, Debug)]
pub struct EventConfig {
    /// Human event name used in charge texts and email subjects
    pub name: String,

    /// Organization name embedded in the charge description
    pub organization: String,

    /// Where the payment provider redirects after a successful payment
    pub success_url: String,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            name: "Retiro de Carnaval de 2024".into(),
            organization: "Igreja Metodista Renovada".into(),
            success_url: "https://www.metodistarenovada.com/retiro-pagamento-obrigado".into(),
        }
    }
}

impl EventConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            name: env_or("EVENT_NAME", &defaults.name),
            organization: env_or("EVENT_ORGANIZATION", &defaults.organization),
            success_url: env_or("EVENT_SUCCESS_URL", &defaults.success_url),
        }
    }
}

/// Fixed texts for the open donation payment link.
#[derive(Clone, Debug)]
pub struct DonationConfig {
    pub name: String,
    pub description: String,
    pub success_url: String,
}

impl Default for DonationConfig {
    fn default() -> Self {
        Self {
            name: "Doação para a construção da nova sede da Igreja Metodista Renovada de Colatina"
                .into(),
            description: "Faça a sua doação para ajudar na construção da nova sede da Igreja \
                          Metodista Renovada de Colatina. \"O tamanho da fé é o que define o \
                          tamanho de uma igreja, pois nosso limite de expansão depende do quanto \
                          acreditamos\""
                .into(),
            success_url: "https://www.metodistarenovada.com/oferta?pagamento=confirmado".into(),
        }
    }
}

/// Application configuration assembled from the environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Record store API key (None disables the store client)
    pub store_api_key: Option<String>,

    /// Email provider API key (None disables the mailer)
    pub email_api_key: Option<String>,

    /// Payment provider API key (None disables link generation)
    pub paylink_api_key: Option<String>,

    /// Team chat webhook URL (None disables the notification sink)
    pub notify_webhook_url: Option<String>,

    /// From-address for transactional emails
    pub email_sender: String,

    pub schema: StoreSchema,
    pub event: EventConfig,
    pub donation: DonationConfig,
}

impl AppConfig {
    /// Build from environment variables. Never fails: missing credentials
    /// surface later as disabled integrations, matching the per-request
    /// credential checks the webhook workflow performs.
    pub fn from_env() -> Self {
        let schema = StoreSchema {
            base_id: env_or("AIRTABLE_BASE_ID", &StoreSchema::default().base_id),
            ..StoreSchema::default()
        };

        Self {
            store_api_key: env_opt("AIRTABLE_API_KEY"),
            email_api_key: env_opt("RESEND_API_KEY"),
            paylink_api_key: env_opt("ASAAS_API_KEY"),
            notify_webhook_url: env_opt("SLACK_WEBHOOK_URL"),
            email_sender: env_or("EMAIL_SENDER", "luiz@metodistarenovada.com"),
            schema,
            event: EventConfig::from_env(),
            donation: DonationConfig::default(),
        }
    }
}
