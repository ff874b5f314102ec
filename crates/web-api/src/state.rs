use std::sync::Arc;

use application::{
    ConnectionRegistry, ConversationService, EventRelay, SignalRelay, SupportTicketService,
};

use crate::JwtService;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConnectionRegistry>,
    pub relay: Arc<EventRelay>,
    pub conversations: Arc<ConversationService>,
    pub tickets: Arc<SupportTicketService>,
    pub signals: Arc<SignalRelay>,
    pub jwt: Arc<JwtService>,
}

impl AppState {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        relay: Arc<EventRelay>,
        conversations: Arc<ConversationService>,
        tickets: Arc<SupportTicketService>,
        signals: Arc<SignalRelay>,
        jwt: Arc<JwtService>,
    ) -> Self {
        Self {
            registry,
            relay,
            conversations,
            tickets,
            signals,
            jwt,
        }
    }
}
