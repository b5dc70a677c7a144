use dashmap::DashMap;
use std::{collections::HashSet, fmt, sync::Arc};
use tracing::{debug, warn};

use super::connection::{Connection, DeliveryError};
use crate::{events::ServerEvent, types::ConnectionId};

/// Topic membership and delivery.
///
/// A topic exists only while its membership set is non-empty; there is no
/// topic object to create or tear down. Delivery is fire-and-forget: every
/// publish enqueues synchronously onto each member's outbound queue, so
/// members of one topic see that topic's events in publish order.
#[derive(Default)]
pub struct TopicRouter {
    /// Live connections by id
    connections: DashMap<ConnectionId, Arc<Connection>>,
    /// Topic name to member connection ids
    topics: DashMap<String, HashSet<ConnectionId>>,
}

impl fmt::Debug for TopicRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicRouter")
            .field("connection_count", &self.connections.len())
            .field("topic_count", &self.topics.len())
            .finish()
    }
}

impl TopicRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a connection addressable. Must happen before it joins topics.
    pub fn register(&self, connection: Arc<Connection>) {
        self.connections.insert(connection.id(), connection);
    }

    /// Add `conn_id` to `topic`. Returns false when it was already a member.
    pub fn join(&self, conn_id: ConnectionId, topic: &str) -> bool {
        if !self.connections.contains_key(&conn_id) {
            warn!(%conn_id, topic, "join for unregistered connection ignored");
            return false;
        }
        self.topics
            .entry(topic.to_string())
            .or_default()
            .insert(conn_id)
    }

    /// Remove `conn_id` from `topic`; no-op when absent.
    pub fn leave(&self, conn_id: ConnectionId, topic: &str) -> bool {
        let removed = self
            .topics
            .get_mut(topic)
            .map(|mut members| members.remove(&conn_id))
            .unwrap_or(false);

        self.topics.remove_if(topic, |_, members| members.is_empty());
        removed
    }

    /// Forget the connection and release every membership it held.
    /// Returns the number of topics it was removed from.
    pub fn disconnect(&self, conn_id: ConnectionId) -> usize {
        self.connections.remove(&conn_id);

        let mut released = 0;
        for mut members in self.topics.iter_mut() {
            if members.value_mut().remove(&conn_id) {
                released += 1;
            }
        }

        // Clean up empty topics
        self.topics.retain(|_, members| !members.is_empty());
        released
    }

    /// Deliver `event` to every current member of `topic`. Returns how many
    /// members it was enqueued for.
    pub fn publish(&self, topic: &str, event: ServerEvent) -> usize {
        let Some(members) = self.topics.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for conn_id in members.iter() {
            let Some(connection) = self.connections.get(conn_id) else {
                continue;
            };
            match connection.deliver(event.clone()) {
                Ok(()) => delivered += 1,
                Err(DeliveryError::Full) => {
                    warn!(
                        %conn_id,
                        topic,
                        event = event.name(),
                        "outbound queue full, event dropped"
                    );
                }
                Err(DeliveryError::Closed) => {
                    debug!(
                        %conn_id,
                        topic,
                        "connection closing, event dropped"
                    );
                }
            }
        }
        delivered
    }

    /// Point-to-point delivery to one connection.
    pub fn send_to(&self, conn_id: ConnectionId, event: ServerEvent) -> bool {
        let Some(connection) = self.get_connection(&conn_id) else {
            return false;
        };
        match connection.deliver(event) {
            Ok(()) => true,
            Err(err) => {
                warn!(%conn_id, error = %err, "direct delivery failed");
                false
            }
        }
    }

    pub fn get_connection(
        &self,
        conn_id: &ConnectionId,
    ) -> Option<Arc<Connection>> {
        self.connections.get(conn_id).map(|c| c.clone())
    }

    pub fn members(&self, topic: &str) -> Vec<ConnectionId> {
        self.topics
            .get(topic)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn topic_exists(&self, topic: &str) -> bool {
        self.topics
            .get(topic)
            .is_some_and(|members| !members.is_empty())
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn healthy_connection_count(&self) -> usize {
        self.connections
            .iter()
            .filter(|connection| connection.is_healthy())
            .count()
    }

    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ConnectionIdentity, ConnectionRole, Coordinate, PackageId,
    };
    use tokio::sync::mpsc;

    fn observer(
        router: &TopicRouter,
        capacity: usize,
    ) -> (ConnectionId, mpsc::Receiver<ServerEvent>) {
        let (connection, rx) = Connection::channel(
            ConnectionIdentity {
                user_id: "sender-1".into(),
                role: ConnectionRole::Observer,
            },
            capacity,
        );
        let id = connection.id();
        router.register(Arc::new(connection));
        (id, rx)
    }

    fn broadcast(lat: f64) -> ServerEvent {
        ServerEvent::PositionBroadcast {
            package_id: PackageId::from("PKG1"),
            position: Coordinate::new(lat, 3.3),
        }
    }

    #[test]
    fn join_is_idempotent_and_topic_follows_membership() {
        let router = TopicRouter::new();
        let (id, _rx) = observer(&router, 8);

        assert!(!router.topic_exists("PKG1"));
        assert!(router.join(id, "PKG1"));
        assert!(!router.join(id, "PKG1"));
        assert_eq!(router.members("PKG1"), vec![id]);

        assert!(router.leave(id, "PKG1"));
        assert!(!router.leave(id, "PKG1"));
        assert!(!router.topic_exists("PKG1"));
        assert_eq!(router.topic_count(), 0);
    }

    #[test]
    fn publish_reaches_members_only() {
        let router = TopicRouter::new();
        let (member, mut member_rx) = observer(&router, 8);
        let (_outsider, mut outsider_rx) = observer(&router, 8);
        router.join(member, "PKG1");

        assert_eq!(router.publish("PKG1", broadcast(6.5)), 1);
        assert_eq!(member_rx.try_recv().unwrap(), broadcast(6.5));
        assert!(outsider_rx.try_recv().is_err());
        assert_eq!(router.publish("PKG2", broadcast(6.5)), 0);
    }

    #[test]
    fn publish_order_is_preserved_within_a_topic() {
        let router = TopicRouter::new();
        let (id, mut rx) = observer(&router, 16);
        router.join(id, "PKG1");

        for step in 0..10 {
            router.publish("PKG1", broadcast(step as f64));
        }
        for step in 0..10 {
            assert_eq!(rx.try_recv().unwrap(), broadcast(step as f64));
        }
    }

    #[test]
    fn disconnect_releases_every_membership() {
        let router = TopicRouter::new();
        let (id, mut rx) = observer(&router, 8);
        let (other, _other_rx) = observer(&router, 8);
        router.join(id, "PKG1");
        router.join(id, "PKG2");
        router.join(other, "PKG2");

        assert_eq!(router.disconnect(id), 2);
        assert_eq!(router.publish("PKG1", broadcast(1.0)), 0);
        assert_eq!(router.publish("PKG2", broadcast(1.0)), 1);
        assert!(rx.try_recv().is_err());
        assert!(!router.topic_exists("PKG1"));
        assert_eq!(router.connection_count(), 1);
    }

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let router = TopicRouter::new();
        let (id, mut rx) = observer(&router, 1);
        router.join(id, "PKG1");

        assert_eq!(router.publish("PKG1", broadcast(1.0)), 1);
        assert_eq!(router.publish("PKG1", broadcast(2.0)), 0);
        assert_eq!(rx.try_recv().unwrap(), broadcast(1.0));
    }

    #[test]
    fn send_to_is_point_to_point() {
        let router = TopicRouter::new();
        let (a, mut a_rx) = observer(&router, 8);
        let (b, mut b_rx) = observer(&router, 8);
        router.join(a, "PKG1");
        router.join(b, "PKG1");

        assert!(router.send_to(a, ServerEvent::error("only you")));
        assert_eq!(a_rx.try_recv().unwrap(), ServerEvent::error("only you"));
        assert!(b_rx.try_recv().is_err());
        let stranger = uuid::Uuid::now_v7();
        assert!(!router.send_to(stranger, ServerEvent::error("nobody")));
    }

    #[test]
    fn unregistered_connections_cannot_join() {
        let router = TopicRouter::new();
        assert!(!router.join(uuid::Uuid::now_v7(), "PKG1"));
        assert!(!router.topic_exists("PKG1"));
    }
}
