//! Push messages and notifications

use std::sync::atomic::Ordering;

use serde::Deserialize;
use tracing::{debug, info};

use crate::proxy::OfflineProxy;

const GALLERY_UPDATE: &str = "gallery-update";
const VIEW_ACTION: &str = "view";

/// Shown notification
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub options: NotificationOptions,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotificationOptions {
    pub body: Option<String>,
    pub icon: Option<String>,
    pub badge: Option<String>,
    /// A new notification replaces a shown one with the same tag
    pub tag: Option<String>,
    pub actions: Vec<NotificationAction>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NotificationAction {
    pub action: String,
    pub title: String,
    pub icon: Option<String>,
}

/// What the host should do with its windows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    OpenWindow(String),
}

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "type")]
    kind: Option<String>,
}

impl OfflineProxy {
    /// Handle a push message. Only `{"type":"gallery-update"}` produces a
    /// notification; anything else, including unparseable data, is ignored.
    pub fn handle_push(&self, data: Option<&[u8]>) -> Option<Notification> {
        let payload: PushPayload = match serde_json::from_slice(data?) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "Ignoring push payload");
                return None;
            }
        };
        if payload.kind.as_deref() != Some(GALLERY_UPDATE) {
            return None;
        }

        let config = self.config();
        let notification = Notification {
            id: self.next_notification.fetch_add(1, Ordering::Relaxed),
            title: config.app_name.clone(),
            options: NotificationOptions {
                body: Some("New photos added to the gallery!".to_string()),
                icon: Some(config.notification_icon.clone()),
                badge: Some(config.notification_icon.clone()),
                tag: Some(GALLERY_UPDATE.to_string()),
                actions: vec![NotificationAction {
                    action: VIEW_ACTION.to_string(),
                    title: "View Gallery".to_string(),
                    icon: None,
                }],
            },
        };

        let mut shown = self.notifications.lock();
        shown.retain(|n| n.options.tag != notification.options.tag);
        shown.push(notification.clone());
        info!(id = notification.id, "Showing gallery update notification");
        Some(notification)
    }

    /// Currently shown notifications
    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().clone()
    }

    /// Close the notification and open the galleries page when the body or
    /// the `view` action was clicked
    pub fn notification_click(&self, id: u64, action: Option<&str>) -> Option<ClientAction> {
        self.notifications.lock().retain(|n| n.id != id);
        match action {
            None | Some("") | Some(VIEW_ACTION) => Some(ClientAction::OpenWindow(self.config().galleries_page.clone())),
            Some(other) => {
                debug!(action = other, "Unhandled notification action");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vitrine_net::StaticFetcher;

    use crate::ProxyConfig;

    fn proxy() -> OfflineProxy {
        OfflineProxy::new(Arc::new(StaticFetcher::new()), ProxyConfig::default()).unwrap()
    }

    #[test]
    fn test_gallery_update() {
        let proxy = proxy();
        let n = proxy.handle_push(Some(br#"{"type":"gallery-update"}"#)).unwrap();
        assert_eq!(n.title, "Events Studio");
        assert_eq!(n.options.body.as_deref(), Some("New photos added to the gallery!"));
        assert_eq!(n.options.actions[0].action, "view");
        assert_eq!(n.options.actions[0].title, "View Gallery");
    }

    #[test]
    fn test_same_tag_replaces() {
        let proxy = proxy();
        proxy.handle_push(Some(br#"{"type":"gallery-update"}"#));
        let second = proxy.handle_push(Some(br#"{"type":"gallery-update"}"#)).unwrap();
        assert_eq!(proxy.notifications(), vec![second]);
    }

    #[test]
    fn test_ignored_payloads() {
        let proxy = proxy();
        assert!(proxy.handle_push(None).is_none());
        assert!(proxy.handle_push(Some(b"not json")).is_none());
        assert!(proxy.handle_push(Some(br#"{"type":"other"}"#)).is_none());
        assert!(proxy.notifications().is_empty());
    }

    #[test]
    fn test_click() {
        let proxy = proxy();
        let n = proxy.handle_push(Some(br#"{"type":"gallery-update"}"#)).unwrap();
        assert_eq!(
            proxy.notification_click(n.id, Some("view")),
            Some(ClientAction::OpenWindow("/galleries.html".into()))
        );
        assert!(proxy.notifications().is_empty());
        assert_eq!(proxy.notification_click(99, Some("dismiss")), None);
        assert_eq!(
            proxy.notification_click(99, None),
            Some(ClientAction::OpenWindow("/galleries.html".into()))
        );
    }
}
