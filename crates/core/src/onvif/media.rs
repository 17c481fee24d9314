//! Media service (`trt`): one H.264 profile backed by the relay stream.
//!
//! `GetStreamUri` is the call that matters. It hands clients
//! [`BridgeConfig::proxy_rtsp_url`], the relay-server's `/stream` path,
//! rather than the camera URL. Audio queries answer with empty lists.

use super::esc;
use crate::config::BridgeConfig;
use crate::soap::Dispatcher;

pub fn dispatcher() -> Dispatcher<BridgeConfig> {
    Dispatcher::new("media")
        .on("GetProfiles", get_profiles)
        .on("GetProfile", get_profile)
        .on("GetVideoSources", get_video_sources)
        .on("GetVideoSourceConfigurations", get_video_source_configurations)
        .on("GetVideoSourceConfiguration", get_video_source_configuration)
        .on("GetVideoEncoderConfigurations", get_video_encoder_configurations)
        .on("GetVideoEncoderConfiguration", get_video_encoder_configuration)
        .on("GetStreamUri", get_stream_uri)
        .on("GetSnapshotUri", get_snapshot_uri)
        .on("GetServiceCapabilities", get_service_capabilities)
        .on("GetVideoSourceConfigurationOptions", get_video_source_configuration_options)
        .on("GetVideoEncoderConfigurationOptions", get_video_encoder_configuration_options)
        .on("GetCompatibleVideoEncoderConfigurations", get_compatible_video_encoder_configurations)
        .on("GetCompatibleVideoSourceConfigurations", get_compatible_video_source_configurations)
        .on("GetAudioSources", get_audio_sources)
        .on("GetAudioSourceConfigurations", get_audio_source_configurations)
        .on("GetAudioEncoderConfigurations", get_audio_encoder_configurations)
}

/// `tt:VideoSourceConfiguration` content, wrapped in `tag`.
fn video_source_configuration(config: &BridgeConfig, tag: &str) -> String {
    let token = esc(&config.video_source_token);
    format!(
        r#"<{tag} token="{token}">
  <tt:Name>VideoSourceConfig</tt:Name>
  <tt:UseCount>1</tt:UseCount>
  <tt:SourceToken>{token}</tt:SourceToken>
  <tt:Bounds x="0" y="0" width="{}" height="{}"/>
</{tag}>"#,
        config.stream_width, config.stream_height
    )
}

/// `tt:VideoEncoderConfiguration` content, wrapped in `tag`.
fn video_encoder_configuration(config: &BridgeConfig, tag: &str) -> String {
    format!(
        r#"<{tag} token="{}">
  <tt:Name>VideoEncoderConfig</tt:Name>
  <tt:UseCount>1</tt:UseCount>
  <tt:Encoding>H264</tt:Encoding>
  <tt:Resolution>
    <tt:Width>{}</tt:Width>
    <tt:Height>{}</tt:Height>
  </tt:Resolution>
  <tt:Quality>5</tt:Quality>
  <tt:RateControl>
    <tt:FrameRateLimit>{}</tt:FrameRateLimit>
    <tt:EncodingInterval>1</tt:EncodingInterval>
    <tt:BitrateLimit>{}</tt:BitrateLimit>
  </tt:RateControl>
  <tt:H264>
    <tt:GovLength>30</tt:GovLength>
    <tt:H264Profile>Main</tt:H264Profile>
  </tt:H264>
  <tt:Multicast>
    <tt:Address>
      <tt:Type>IPv4</tt:Type>
      <tt:IPv4Address>0.0.0.0</tt:IPv4Address>
    </tt:Address>
    <tt:Port>0</tt:Port>
    <tt:TTL>0</tt:TTL>
    <tt:AutoStart>false</tt:AutoStart>
  </tt:Multicast>
  <tt:SessionTimeout>PT60S</tt:SessionTimeout>
</{tag}>"#,
        esc(&config.video_encoder_token),
        config.stream_width,
        config.stream_height,
        config.stream_fps,
        config.stream_bitrate,
    )
}

fn media_uri(uri: &str) -> String {
    format!(
        r#"<trt:MediaUri>
  <tt:Uri>{}</tt:Uri>
  <tt:InvalidAfterConnect>false</tt:InvalidAfterConnect>
  <tt:InvalidAfterReboot>false</tt:InvalidAfterReboot>
  <tt:Timeout>PT60S</tt:Timeout>
</trt:MediaUri>"#,
        esc(uri)
    )
}

fn profiles(config: &BridgeConfig, response: &str, element: &str) -> String {
    format!(
        "<trt:{response}>\n<trt:{element} token=\"{}\" fixed=\"true\">\n<tt:Name>{}</tt:Name>\n{}\n{}\n</trt:{element}>\n</trt:{response}>",
        esc(&config.profile_token),
        esc(&config.camera_name),
        video_source_configuration(config, "tt:VideoSourceConfiguration"),
        video_encoder_configuration(config, "tt:VideoEncoderConfiguration"),
    )
}

fn get_profiles(config: &BridgeConfig, _body: &[u8]) -> String {
    profiles(config, "GetProfilesResponse", "Profiles")
}

/// Single-profile device: any requested token gets the one profile.
fn get_profile(config: &BridgeConfig, _body: &[u8]) -> String {
    profiles(config, "GetProfileResponse", "Profile")
}

fn get_video_sources(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<trt:GetVideoSourcesResponse>
  <trt:VideoSources token="{}">
    <tt:Framerate>{}</tt:Framerate>
    <tt:Resolution>
      <tt:Width>{}</tt:Width>
      <tt:Height>{}</tt:Height>
    </tt:Resolution>
  </trt:VideoSources>
</trt:GetVideoSourcesResponse>"#,
        esc(&config.video_source_token),
        config.stream_fps,
        config.stream_width,
        config.stream_height,
    )
}

fn get_video_source_configurations(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetVideoSourceConfigurationsResponse>\n{}\n</trt:GetVideoSourceConfigurationsResponse>",
        video_source_configuration(config, "trt:Configurations")
    )
}

fn get_video_source_configuration(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetVideoSourceConfigurationResponse>\n{}\n</trt:GetVideoSourceConfigurationResponse>",
        video_source_configuration(config, "trt:Configuration")
    )
}

fn get_video_encoder_configurations(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetVideoEncoderConfigurationsResponse>\n{}\n</trt:GetVideoEncoderConfigurationsResponse>",
        video_encoder_configuration(config, "trt:Configurations")
    )
}

fn get_video_encoder_configuration(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetVideoEncoderConfigurationResponse>\n{}\n</trt:GetVideoEncoderConfigurationResponse>",
        video_encoder_configuration(config, "trt:Configuration")
    )
}

fn get_stream_uri(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetStreamUriResponse>\n{}\n</trt:GetStreamUriResponse>",
        media_uri(&config.proxy_rtsp_url())
    )
}

// There is no snapshot endpoint behind this URL; some clients refuse a
// profile without one.
fn get_snapshot_uri(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetSnapshotUriResponse>\n{}\n</trt:GetSnapshotUriResponse>",
        media_uri(&format!("{}/snapshot", config.onvif_service_url()))
    )
}

fn get_service_capabilities(_config: &BridgeConfig, _body: &[u8]) -> String {
    r#"<trt:GetServiceCapabilitiesResponse>
  <trt:Capabilities SnapshotUri="false" Rotation="false" VideoSourceMode="false" OSD="false">
    <trt:ProfileCapabilities MaximumNumberOfProfiles="1"/>
    <trt:StreamingCapabilities RTPMulticast="false" RTP_TCP="true" RTP_RTSP_TCP="true" NonAggregateControl="false"/>
  </trt:Capabilities>
</trt:GetServiceCapabilitiesResponse>"#
        .to_string()
}

fn get_video_source_configuration_options(config: &BridgeConfig, _body: &[u8]) -> String {
    let (w, h) = (config.stream_width, config.stream_height);
    format!(
        r#"<trt:GetVideoSourceConfigurationOptionsResponse>
  <trt:Options>
    <tt:BoundsRange>
      <tt:XRange><tt:Min>0</tt:Min><tt:Max>0</tt:Max></tt:XRange>
      <tt:YRange><tt:Min>0</tt:Min><tt:Max>0</tt:Max></tt:YRange>
      <tt:WidthRange><tt:Min>{w}</tt:Min><tt:Max>{w}</tt:Max></tt:WidthRange>
      <tt:HeightRange><tt:Min>{h}</tt:Min><tt:Max>{h}</tt:Max></tt:HeightRange>
    </tt:BoundsRange>
    <tt:VideoSourceTokensAvailable>{}</tt:VideoSourceTokensAvailable>
  </trt:Options>
</trt:GetVideoSourceConfigurationOptionsResponse>"#,
        esc(&config.video_source_token)
    )
}

fn get_video_encoder_configuration_options(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        r#"<trt:GetVideoEncoderConfigurationOptionsResponse>
  <trt:Options>
    <tt:QualityRange><tt:Min>1</tt:Min><tt:Max>10</tt:Max></tt:QualityRange>
    <tt:H264>
      <tt:ResolutionsAvailable>
        <tt:Width>{}</tt:Width>
        <tt:Height>{}</tt:Height>
      </tt:ResolutionsAvailable>
      <tt:GovLengthRange><tt:Min>1</tt:Min><tt:Max>300</tt:Max></tt:GovLengthRange>
      <tt:FrameRateRange><tt:Min>1</tt:Min><tt:Max>30</tt:Max></tt:FrameRateRange>
      <tt:EncodingIntervalRange><tt:Min>1</tt:Min><tt:Max>10</tt:Max></tt:EncodingIntervalRange>
      <tt:H264ProfilesSupported>Main</tt:H264ProfilesSupported>
      <tt:H264ProfilesSupported>Baseline</tt:H264ProfilesSupported>
      <tt:H264ProfilesSupported>High</tt:H264ProfilesSupported>
    </tt:H264>
  </trt:Options>
</trt:GetVideoEncoderConfigurationOptionsResponse>"#,
        config.stream_width, config.stream_height
    )
}

fn get_compatible_video_encoder_configurations(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetCompatibleVideoEncoderConfigurationsResponse>\n{}\n</trt:GetCompatibleVideoEncoderConfigurationsResponse>",
        video_encoder_configuration(config, "trt:Configurations")
    )
}

fn get_compatible_video_source_configurations(config: &BridgeConfig, _body: &[u8]) -> String {
    format!(
        "<trt:GetCompatibleVideoSourceConfigurationsResponse>\n{}\n</trt:GetCompatibleVideoSourceConfigurationsResponse>",
        video_source_configuration(config, "trt:Configurations")
    )
}

fn get_audio_sources(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<trt:GetAudioSourcesResponse/>".to_string()
}

fn get_audio_source_configurations(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<trt:GetAudioSourceConfigurationsResponse/>".to_string()
}

fn get_audio_encoder_configurations(_config: &BridgeConfig, _body: &[u8]) -> String {
    "<trt:GetAudioEncoderConfigurationsResponse/>".to_string()
}
