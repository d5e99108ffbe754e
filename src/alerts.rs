use crate::config::MonitorConfig;
use crate::connection::ConnectionEvent;
use crate::types::{AlertAction, SelectedDevice};
use serde::{Deserialize, Serialize};

/// An alert the host should play
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    pub action: AlertAction,
    pub device: SelectedDevice,
}

/// Decides which connection events turn into audible alerts
#[derive(Debug, Clone)]
pub struct AlertPolicy {
    notify_connection_lost: bool,
    notify_on_api_quit: bool,
    play_jingle_on_interaction: bool,
    intentional_api_change: bool,
}

impl AlertPolicy {
    pub fn new(
        notify_connection_lost: bool,
        notify_on_api_quit: bool,
        play_jingle_on_interaction: bool,
    ) -> Self {
        Self {
            notify_connection_lost,
            notify_on_api_quit,
            play_jingle_on_interaction,
            intentional_api_change: false,
        }
    }

    /// Policy with the switches from `config`
    pub fn from_config(config: &MonitorConfig) -> Self {
        Self::new(
            config.notify_connection_lost,
            config.notify_on_api_quit,
            config.play_jingle_on_interaction,
        )
    }

    /// The next connection loss is caused by the user switching API
    pub fn expect_api_change(&mut self) {
        self.intentional_api_change = true;
    }

    /// Action to raise for `event`, if any
    pub fn on_connection_event(&mut self, event: &ConnectionEvent) -> Option<AlertAction> {
        match event {
            ConnectionEvent::StatusChangedToNotOk { sub_status, .. } => {
                if std::mem::take(&mut self.intentional_api_change) {
                    tracing::debug!("Connection loss from API switch, no alert");
                    return None;
                }

                let controlled_quit = sub_status.is_controlled_quit();
                let alert = (self.notify_connection_lost && !controlled_quit)
                    || (self.notify_on_api_quit && controlled_quit);
                alert.then_some(AlertAction::ConnectionLost)
            }
            ConnectionEvent::HmdUserInteractionStarted { .. } if self.play_jingle_on_interaction => {
                Some(AlertAction::Jingle)
            }
            _ => None,
        }
    }
}
