//! Event service (`tev`): pull-point subscriptions that never yield events.
//!
//! Subscriptions are not tracked. Every subscribe or renew answers with a
//! termination time one hour out and the events service URL as the
//! subscription reference; `PullMessages` always comes back empty.

use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};

use super::esc;
use crate::config::BridgeConfig;
use crate::soap::Dispatcher;

/// Lifetime advertised for every subscription.
pub const SUBSCRIPTION_TTL: TimeDelta = TimeDelta::hours(1);

pub fn dispatcher() -> Dispatcher<BridgeConfig> {
    Dispatcher::new("events")
        .on("GetServiceCapabilities", get_service_capabilities)
        .on("GetEventProperties", get_event_properties)
        .on("CreatePullPointSubscription", create_pull_point_subscription)
        .on("PullMessages", pull_messages)
        .on("Unsubscribe", unsubscribe)
        .on("Renew", renew)
        .on("Subscribe", subscribe)
}

/// `(current, termination)` timestamps.
fn lease() -> (String, String) {
    let now = Utc::now();
    (timestamp(now), timestamp(now + SUBSCRIPTION_TTL))
}

fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn get_service_capabilities(_config: &BridgeConfig, _body: &[u8]) -> String {
    r#"<tev:GetServiceCapabilitiesResponse>
  <tev:Capabilities WSSubscriptionPolicySupport="false" WSPullPointSupport="true" WSPausableSubscriptionManagerInterfaceSupport="false" MaxNotificationProducers="1" MaxPullPoints="2" PersistentNotificationStorage="false"/>
</tev:GetServiceCapabilitiesResponse>"#
        .to_string()
}

fn get_event_properties(_config: &BridgeConfig, _body: &[u8]) -> String {
    r#"<tev:GetEventPropertiesResponse>
  <tev:TopicNamespaceLocation>http://www.onvif.org/onvif/ver10/topics/topicns.xml</tev:TopicNamespaceLocation>
  <wsnt:FixedTopicSet>true</wsnt:FixedTopicSet>
  <wstop:TopicSet>
    <tt:Device>
      <tt:Trigger wstop:topic="true">
        <tt:MessageDescription IsProperty="false">
          <tt:Source>
            <tt:SimpleItemDescription Name="VideoSourceToken" Type="tt:ReferenceToken"/>
          </tt:Source>
        </tt:MessageDescription>
      </tt:Trigger>
    </tt:Device>
  </wstop:TopicSet>
  <wsnt:TopicExpressionDialect>http://www.onvif.org/ver10/tev/topicExpression/ConcreteSet</wsnt:TopicExpressionDialect>
  <wsnt:TopicExpressionDialect>http://docs.oasis-open.org/wsn/t-1/TopicExpression/Concrete</wsnt:TopicExpressionDialect>
  <tev:MessageContentFilterDialect>http://www.onvif.org/ver10/tev/messageContentFilter/ItemFilter</tev:MessageContentFilterDialect>
  <tev:MessageContentSchemaLocation>http://www.onvif.org/onvif/ver10/schema/onvif.xsd</tev:MessageContentSchemaLocation>
</tev:GetEventPropertiesResponse>"#
        .to_string()
}

fn create_pull_point_subscription(config: &BridgeConfig, _body: &[u8]) -> String {
    let (now, until) = lease();
    format!(
        r#"<tev:CreatePullPointSubscriptionResponse>
  <tev:SubscriptionReference>
    <wsa:Address>{}</wsa:Address>
  </tev:SubscriptionReference>
  <wsnt:CurrentTime>{now}</wsnt:CurrentTime>
  <wsnt:TerminationTime>{until}</wsnt:TerminationTime>
</tev:CreatePullPointSubscriptionResponse>"#,
        esc(&config.events_service_url())
    )
}

fn pull_messages(_config: &BridgeConfig, _body: &[u8]) -> String {
    let (now, until) = lease();
    format!(
        r#"<tev:PullMessagesResponse>
  <tev:CurrentTime>{now}</tev:CurrentTime>
  <tev:TerminationTime>{until}</tev:TerminationTime>
</tev:PullMessagesResponse>"#
    )
}

fn unsubscribe(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<wsnt:UnsubscribeResponse/>".to_string()
}

fn renew(_config: &BridgeConfig, _body: &[u8]) -> String {
    let (now, until) = lease();
    format!(
        r#"<wsnt:RenewResponse>
  <wsnt:TerminationTime>{until}</wsnt:TerminationTime>
  <wsnt:CurrentTime>{now}</wsnt:CurrentTime>
</wsnt:RenewResponse>"#
    )
}

fn subscribe(config: &BridgeConfig, _body: &[u8]) -> String {
    let (now, until) = lease();
    format!(
        r#"<wsnt:SubscribeResponse>
  <wsnt:SubscriptionReference>
    <wsa:Address>{}</wsa:Address>
  </wsnt:SubscriptionReference>
  <wsnt:CurrentTime>{now}</wsnt:CurrentTime>
  <wsnt:TerminationTime>{until}</wsnt:TerminationTime>
</wsnt:SubscribeResponse>"#,
        esc(&config.events_service_url())
    )
}
