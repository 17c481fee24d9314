//! Device management service (`tds`).

use chrono::{Datelike, Timelike, Utc};

use super::esc;
use crate::config::BridgeConfig;
use crate::soap::Dispatcher;

/// Hostname reported by `GetHostname`.
pub const HOSTNAME: &str = "onvif-bridge";

pub fn dispatcher() -> Dispatcher<BridgeConfig> {
    Dispatcher::new("device")
        .on("GetDeviceInformation", get_device_information)
        .on("GetCapabilities", get_capabilities)
        .on("GetServices", get_services)
        .on("GetServiceCapabilities", get_service_capabilities)
        .on("GetSystemDateAndTime", get_system_date_and_time)
        .on("GetScopes", get_scopes)
        .on("GetHostname", get_hostname)
        .on("GetNetworkInterfaces", get_network_interfaces)
        .on("GetDNS", get_dns)
        .on("GetNTP", get_ntp)
        .on("GetUsers", get_users)
        .on("GetWsdlUrl", get_wsdl_url)
}

fn get_device_information(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<tds:GetDeviceInformationResponse>
  <tds:Manufacturer>{}</tds:Manufacturer>
  <tds:Model>{}</tds:Model>
  <tds:FirmwareVersion>{}</tds:FirmwareVersion>
  <tds:SerialNumber>{}</tds:SerialNumber>
  <tds:HardwareId>{}</tds:HardwareId>
</tds:GetDeviceInformationResponse>"#,
        esc(&config.camera_manufacturer),
        esc(&config.camera_model),
        esc(&config.camera_firmware),
        esc(&config.camera_serial),
        esc(&config.hardware_id),
    )
}

fn get_capabilities(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<tds:GetCapabilitiesResponse>
  <tds:Capabilities>
    <tt:Device>
      <tt:XAddr>{device}</tt:XAddr>
      <tt:Network>
        <tt:IPFilter>false</tt:IPFilter>
        <tt:ZeroConfiguration>false</tt:ZeroConfiguration>
        <tt:IPVersion6>false</tt:IPVersion6>
        <tt:DynDNS>false</tt:DynDNS>
      </tt:Network>
      <tt:System>
        <tt:DiscoveryResolve>false</tt:DiscoveryResolve>
        <tt:DiscoveryBye>true</tt:DiscoveryBye>
        <tt:RemoteDiscovery>false</tt:RemoteDiscovery>
        <tt:SystemBackup>false</tt:SystemBackup>
        <tt:SystemLogging>false</tt:SystemLogging>
        <tt:FirmwareUpgrade>false</tt:FirmwareUpgrade>
        <tt:SupportedVersions>
          <tt:Major>2</tt:Major>
          <tt:Minor>0</tt:Minor>
        </tt:SupportedVersions>
      </tt:System>
      <tt:IO>
        <tt:InputConnectors>0</tt:InputConnectors>
        <tt:RelayOutputs>0</tt:RelayOutputs>
      </tt:IO>
      <tt:Security>
        <tt:TLS1.1>false</tt:TLS1.1>
        <tt:TLS1.2>false</tt:TLS1.2>
        <tt:OnboardKeyGeneration>false</tt:OnboardKeyGeneration>
        <tt:AccessPolicyConfig>false</tt:AccessPolicyConfig>
        <tt:X.509Token>false</tt:X.509Token>
        <tt:SAMLToken>false</tt:SAMLToken>
        <tt:KerberosToken>false</tt:KerberosToken>
        <tt:RELToken>false</tt:RELToken>
      </tt:Security>
    </tt:Device>
    <tt:Media>
      <tt:XAddr>{media}</tt:XAddr>
      <tt:StreamingCapabilities>
        <tt:RTPMulticast>false</tt:RTPMulticast>
        <tt:RTP_TCP>true</tt:RTP_TCP>
        <tt:RTP_RTSP_TCP>true</tt:RTP_RTSP_TCP>
      </tt:StreamingCapabilities>
    </tt:Media>
    <tt:Events>
      <tt:XAddr>{events}</tt:XAddr>
      <tt:WSSubscriptionPolicySupport>false</tt:WSSubscriptionPolicySupport>
      <tt:WSPullPointSupport>true</tt:WSPullPointSupport>
      <tt:WSPausableSubscriptionManagerInterfaceSupport>false</tt:WSPausableSubscriptionManagerInterfaceSupport>
    </tt:Events>
  </tds:Capabilities>
</tds:GetCapabilitiesResponse>"#,
        device = esc(&config.device_service_url()),
        media = esc(&config.media_service_url()),
        events = esc(&config.events_service_url()),
    )
}

fn get_services(config: &BridgeConfig, _body: &[u8]) -> String {
    let services = [
        (crate::soap::TDS_NS, config.device_service_url()),
        (crate::soap::TRT_NS, config.media_service_url()),
        (crate::soap::TEV_NS, config.events_service_url()),
    ];

    let mut out = String::from("<tds:GetServicesResponse>\n");
    for (namespace, xaddr) in services {
        out.push_str(&format!(
            r#"  <tds:Service>
    <tds:Namespace>{namespace}</tds:Namespace>
    <tds:XAddr>{}</tds:XAddr>
    <tds:Version>
      <tt:Major>2</tt:Major>
      <tt:Minor>0</tt:Minor>
    </tds:Version>
  </tds:Service>
"#,
            esc(&xaddr)
        ));
    }
    out.push_str("</tds:GetServicesResponse>");
    out
}

fn get_service_capabilities(_config: &BridgeConfig, _body: &[u8]) -> String {
    r#"<tds:GetServiceCapabilitiesResponse>
  <tds:Capabilities>
    <tds:Network DHCPv6="false" NTP="0" HostnameFromDHCP="false" Dot11Configuration="false" Dot1XConfigurations="0" DynDNS="false" IPVersion6="false" ZeroConfiguration="false" IPFilter="false"/>
    <tds:Security TLS1.0="false" TLS1.1="false" TLS1.2="false" OnboardKeyGeneration="false" AccessPolicyConfig="false" DefaultAccessPolicy="false" Dot1X="false" RemoteUserHandling="false" X.509Token="false" SAMLToken="false" KerberosToken="false" UsernameToken="true" HttpDigest="true" RELToken="false"/>
    <tds:System DiscoveryResolve="false" DiscoveryBye="true" RemoteDiscovery="false" SystemBackup="false" SystemLogging="false" FirmwareUpgrade="false" HttpFirmwareUpgrade="false" HttpSystemBackup="false" HttpSystemLogging="false" HttpSupportInformation="false"/>
  </tds:Capabilities>
</tds:GetServiceCapabilitiesResponse>"#
        .to_string()
}

fn get_system_date_and_time(_config: &BridgeConfig, _body: &[u8]) -> String {
    let now = Utc::now();
    // UTC and local time are the same: the device reports TZ UTC0.
    let date_time = format!(
        "<tt:Time><tt:Hour>{}</tt:Hour><tt:Minute>{}</tt:Minute><tt:Second>{}</tt:Second></tt:Time>\
         <tt:Date><tt:Year>{}</tt:Year><tt:Month>{}</tt:Month><tt:Day>{}</tt:Day></tt:Date>",
        now.hour(),
        now.minute(),
        now.second(),
        now.year(),
        now.month(),
        now.day(),
    );
    format!(
        r#"<tds:GetSystemDateAndTimeResponse>
  <tds:SystemDateAndTime>
    <tt:DateTimeType>NTP</tt:DateTimeType>
    <tt:DaylightSavings>false</tt:DaylightSavings>
    <tt:TimeZone><tt:TZ>UTC0</tt:TZ></tt:TimeZone>
    <tt:UTCDateTime>{date_time}</tt:UTCDateTime>
    <tt:LocalDateTime>{date_time}</tt:LocalDateTime>
  </tds:SystemDateAndTime>
</tds:GetSystemDateAndTimeResponse>"#
    )
}

fn get_scopes(config: &BridgeConfig, _body: &[u8]) -> String {
    let scopes = [
        ("Fixed", "onvif://www.onvif.org/type/video_encoder".to_string()),
        ("Fixed", "onvif://www.onvif.org/type/Network_Video_Transmitter".to_string()),
        ("Fixed", "onvif://www.onvif.org/Profile/Streaming".to_string()),
        ("Fixed", format!("onvif://www.onvif.org/hardware/{}", config.camera_model)),
        ("Configurable", format!("onvif://www.onvif.org/name/{}", config.scope_name())),
        ("Configurable", "onvif://www.onvif.org/location/".to_string()),
    ];

    let mut out = String::from("<tds:GetScopesResponse>\n");
    for (def, item) in &scopes {
        out.push_str(&format!(
            "  <tds:Scopes><tt:ScopeDef>{def}</tt:ScopeDef><tt:ScopeItem>{}</tt:ScopeItem></tds:Scopes>\n",
            esc(item)
        ));
    }
    out.push_str("</tds:GetScopesResponse>");
    out
}

fn get_hostname(_config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<tds:GetHostnameResponse>
  <tds:HostnameInformation>
    <tt:FromDHCP>false</tt:FromDHCP>
    <tt:Name>{HOSTNAME}</tt:Name>
  </tds:HostnameInformation>
</tds:GetHostnameResponse>"#
    )
}

fn get_network_interfaces(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<tds:GetNetworkInterfacesResponse>
  <tds:NetworkInterfaces token="eth0">
    <tt:Enabled>true</tt:Enabled>
    <tt:Info>
      <tt:Name>eth0</tt:Name>
      <tt:HwAddress>00:00:00:00:00:00</tt:HwAddress>
      <tt:MTU>1500</tt:MTU>
    </tt:Info>
    <tt:IPv4>
      <tt:Enabled>true</tt:Enabled>
      <tt:Config>
        <tt:Manual>
          <tt:Address>{}</tt:Address>
          <tt:PrefixLength>24</tt:PrefixLength>
        </tt:Manual>
        <tt:DHCP>false</tt:DHCP>
      </tt:Config>
    </tt:IPv4>
  </tds:NetworkInterfaces>
</tds:GetNetworkInterfacesResponse>"#,
        esc(&config.server_ip)
    )
}

fn get_dns(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<tds:GetDNSResponse><tds:DNSInformation><tt:FromDHCP>false</tt:FromDHCP></tds:DNSInformation></tds:GetDNSResponse>"
        .to_string()
}

fn get_ntp(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<tds:GetNTPResponse><tds:NTPInformation><tt:FromDHCP>false</tt:FromDHCP></tds:NTPInformation></tds:GetNTPResponse>"
        .to_string()
}

fn get_users(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<tds:GetUsersResponse>
  <tds:User>
    <tt:Username>{}</tt:Username>
    <tt:UserLevel>Administrator</tt:UserLevel>
  </tds:User>
</tds:GetUsersResponse>"#,
        esc(&config.onvif_username)
    )
}

fn get_wsdl_url(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<tds:GetWsdlUrlResponse><tds:WsdlUrl>{}?wsdl</tds:WsdlUrl></tds:GetWsdlUrlResponse>",
        esc(&config.device_service_url())
    )
}
