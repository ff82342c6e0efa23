//! # Cloud task
//! Keeps the device connected to the hub: joins the `WiFi` network, runs DHCP, and holds an MQTT session with the
//! broker. Messages from the alarm cycle go out on the telemetry topic, twin documents and direct methods coming in
//! are handed to the [`RemoteCommandHandler`].
//!
//! Whenever anything fails, the session is torn down and rebuilt after [`RETRY_DELAY`]. The alarm itself keeps
//! running without the hub.
//!
//! # populate constants SSID and PASSWORD
//! make sure to have a `wifi_config.json` file in the config folder formatted as follows:
//!```json
//!  {
//!     "ssid": "some_ssid_here",
//!     "password": "some_password_here"
//! }
//! ```
//!
//! # populate the hub constants
//! make sure to have a `hub_config.json` file in the config folder formatted as follows:
//! ```json
//! {
//!     "broker": "192.168.1.10",
//!     "port": 1883,
//!     "device_id": "perimeter-alarm",
//!     "username": "some_user",
//!     "password": "some_password"
//! }
//! ```
//! build.rs turns both into constants, and creates dummy files if they are missing.

include!(concat!(env!("OUT_DIR"), "/wifi_secrets.rs"));
include!(concat!(env!("OUT_DIR"), "/hub_config.rs"));

use crate::WifiResources;
use crate::task::hub_socket::{SharedSocket, SocketCell};
use crate::task::resources::Irqs;
use crate::task::task_messages::{HUB_CONNECTED, OUTBOUND_CHANNEL, REMOTE_INBOX, REMOTE_INBOX_DEPTH};
use cyw43::JoinOptions;
use cyw43_pio::{DEFAULT_CLOCK_DIVIDER, PioSpi};
use defmt::{Format, debug, error, info, warn};
use embassy_executor::Spawner;
use embassy_futures::select::{Either3, select3};
use embassy_net::tcp::{ConnectError, TcpSocket};
use embassy_net::{Config, DhcpConfig, IpAddress, Ipv4Address, Stack, StackResources};
use embassy_rp::clocks::RoscRng;
use embassy_rp::gpio::{Level, Output};
use embassy_rp::peripherals::{DMA_CH0, PIO0};
use embassy_rp::pio::Pio;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::{Duration, Ticker, Timer, with_timeout};
use heapless::{String, Vec};
use pico_perimeter_alarm::config::{AlarmConfig, EventFraming};
use pico_perimeter_alarm::error::PublishError;
use pico_perimeter_alarm::hub::{self, InboundTopic, KeepAlive, PingAction, TOPIC_CAPACITY};
use pico_perimeter_alarm::remote::RemoteCommandHandler;
use pico_perimeter_alarm::telemetry::TelemetryMessage;
use portable_atomic::Ordering;
use rand::RngCore;
use rust_mqtt::{
    client::{
        client_config::{ClientConfig, MqttVersion},
        raw_client::{Event, RawMqttClient},
    },
    packet::v5::{publish_packet::QualityOfService, reason_codes::ReasonCode},
    utils::rng_generator::CountingRng,
};
use static_cell::StaticCell;

/// Wait between two connection attempts
const RETRY_DELAY: Duration = Duration::from_secs(10);
/// How long DHCP may take
const DHCP_TIMEOUT: Duration = Duration::from_secs(10);
/// Interval of MQTT pings on an idle session
const PING_INTERVAL: Duration = Duration::from_secs(30);
/// Socket inactivity timeout, longer than the ping interval
const SOCKET_TIMEOUT: Duration = Duration::from_secs(90);
/// Size of the MQTT packet buffers, and the largest inbound payload we accept
const MQTT_BUFFER_SIZE: usize = 1024;

/// The handler the hub messages go through
type Handler = RemoteCommandHandler<'static, CriticalSectionRawMutex, REMOTE_INBOX_DEPTH>;

/// The MQTT client of a session
type HubClient<'a, 's, 'd> = RawMqttClient<'a, SharedSocket<'s, 'd>, 5, CountingRng>;

/// Why a session ended
#[derive(Format)]
enum SessionError {
    /// The TCP connection to the broker failed
    Connect(ConnectError),
    /// The broker or the MQTT client reported an error
    Mqtt(ReasonCode),
    /// A message for the hub could not be sent
    Publish(PublishError),
    /// The broker answered the connect with something other than an ack
    UnexpectedPacket,
    /// The broker did not answer a ping within a ping interval
    PingUnanswered,
    /// A topic did not fit its buffer
    TopicTooLong,
}

/// A message from the broker, copied out of the client's receive buffer
struct Inbound {
    /// Topic it arrived on
    topic: String<TOPIC_CAPACITY>,
    /// The payload
    payload: Vec<u8, MQTT_BUFFER_SIZE>,
}

impl Inbound {
    /// Copy topic and payload, `None` if either is too large
    fn copy(topic: &str, payload: &[u8]) -> Option<Self> {
        Some(Self {
            topic: String::try_from(topic).ok()?,
            payload: Vec::from_slice(payload).ok()?,
        })
    }
}

/// What woke up the session loop
enum SessionEvent {
    /// A message from the broker, `None` if it was too large to handle
    Inbound(Option<Inbound>),
    /// A message for the hub from the alarm cycle
    Outbound(TelemetryMessage),
    /// Time to ping
    Ping,
    /// The broker answered a ping
    PingResponse,
    /// The broker acknowledged a request
    Ack,
}

#[embassy_executor::task]
async fn cyw43_task(
    runner: cyw43::Runner<'static, Output<'static>, PioSpi<'static, PIO0, 0, DMA_CH0>>,
) -> ! {
    runner.run().await
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, cyw43::NetDriver<'static>>) -> ! {
    runner.run().await
}

#[embassy_executor::task]
pub async fn cloud(spawner: Spawner, r: WifiResources) {
    info!("Cloud task started");

    info!("init wifi");
    let pwr = Output::new(r.pwr_pin, Level::Low);
    let cs = Output::new(r.cs_pin, Level::High);
    let mut pio = Pio::new(r.pio_sm, Irqs);
    let spi = PioSpi::new(
        &mut pio.common,
        pio.sm0,
        DEFAULT_CLOCK_DIVIDER,
        pio.irq0,
        cs,
        r.dio_pin,
        r.clk_pin,
        r.dma_ch,
    );

    // the cyw43 firmware blobs are flashed separately, at these addresses
    let fw = unsafe { core::slice::from_raw_parts(0x1010_0000 as *const u8, 230_321) };
    let clm = unsafe { core::slice::from_raw_parts(0x1014_0000 as *const u8, 4752) };

    static STATE: StaticCell<cyw43::State> = StaticCell::new();
    let state = STATE.init(cyw43::State::new());
    let (net_device, mut control, runner) = cyw43::new(state, pwr, spi, fw).await;
    spawner.must_spawn(cyw43_task(runner));

    info!("init control");
    control.init(clm).await;
    control
        .set_power_management(cyw43::PowerManagementMode::PowerSave)
        .await;

    let mut dhcp_config = DhcpConfig::default();
    dhcp_config.hostname = "perimeter-alarm".try_into().ok();

    // random seed
    let mut rng = RoscRng;
    let seed = rng.next_u64();

    static RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();
    let (stack, runner) = embassy_net::new(
        net_device,
        Config::dhcpv4(dhcp_config),
        RESOURCES.init(StackResources::new()),
        seed,
    );
    spawner.must_spawn(net_task(runner));

    let handler = RemoteCommandHandler::new(&REMOTE_INBOX);
    let Ok(telemetry_topic) = hub::telemetry_topic(DEVICE_ID) else {
        error!("Device id {} too long for the telemetry topic", DEVICE_ID);
        return;
    };

    loop {
        if !stack.is_link_up() {
            info!("Joining WPA2 network with SSID: {}", SSID);
            if let Err(e) = control
                .join(SSID, JoinOptions::new(PASSWORD.as_bytes()))
                .await
            {
                warn!("Failed to join WiFi network with status {}", e.status);
                Timer::after(RETRY_DELAY).await;
                continue;
            }
            control.gpio_set(0, true).await; // Turn on the onboard LED
            info!("Connected to wifi");
        }

        info!("Waiting for DHCP");
        if with_timeout(DHCP_TIMEOUT, stack.wait_config_up())
            .await
            .is_err()
        {
            warn!("DHCP timed out, leaving the network");
            control.leave().await;
            control.gpio_set(0, false).await; // Turn off the onboard LED
            Timer::after(RETRY_DELAY).await;
            continue;
        }
        info!("DHCP is now up");

        if let Err(e) = run_session(stack, &handler, &telemetry_topic).await {
            warn!("Hub session ended: {:?}", e);
        }
        HUB_CONNECTED.store(false, Ordering::Relaxed);

        info!("Reconnecting in {} s", RETRY_DELAY.as_secs());
        Timer::after(RETRY_DELAY).await;
    }
}

/// Connect to the broker and serve the session until something fails
async fn run_session(
    stack: Stack<'_>,
    handler: &Handler,
    telemetry_topic: &str,
) -> Result<(), SessionError> {
    let mut rx_buffer = [0; 4096];
    let mut tx_buffer = [0; 4096];

    let mut mqtt_rx_buffer = [0; MQTT_BUFFER_SIZE];
    let mut mqtt_tx_buffer = [0; MQTT_BUFFER_SIZE];

    let mut socket = TcpSocket::new(stack, &mut rx_buffer, &mut tx_buffer);
    socket.set_timeout(Some(SOCKET_TIMEOUT));

    let [a, b, c, d] = BROKER_ADDRESS;
    let broker = IpAddress::Ipv4(Ipv4Address::new(a, b, c, d));
    info!("Connecting to MQTT broker {}:{}", broker, BROKER_PORT);
    socket
        .connect((broker, BROKER_PORT))
        .await
        .map_err(SessionError::Connect)?;

    let socket = SocketCell::new(socket);
    let link = SharedSocket::new(&socket);

    let mut client = {
        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(20000));
        config.add_client_id(DEVICE_ID);
        config.add_username(HUB_USERNAME);
        config.add_password(HUB_PASSWORD);
        #[allow(clippy::cast_possible_truncation)]
        {
            config.max_packet_size = MQTT_BUFFER_SIZE as u32;
        }

        RawMqttClient::<_, 5, _>::new(
            link,
            &mut mqtt_tx_buffer,
            MQTT_BUFFER_SIZE,
            &mut mqtt_rx_buffer,
            MQTT_BUFFER_SIZE,
            config,
        )
    };

    client
        .connect_to_broker()
        .await
        .map_err(SessionError::Mqtt)?;
    match client.poll::<0>().await.map_err(SessionError::Mqtt)? {
        Event::Connack => info!("Connected to MQTT broker"),
        Event::Disconnect(reason) => return Err(SessionError::Mqtt(reason)),
        _ => return Err(SessionError::UnexpectedPacket),
    }

    // the subscription acks are read by the session loop, the broker handles the twin request after them
    for topic in [
        hub::TWIN_PATCH_SUBSCRIPTION,
        hub::TWIN_RESPONSE_SUBSCRIPTION,
        hub::METHOD_SUBSCRIPTION,
    ] {
        client
            .subscribe_to_topic(topic)
            .await
            .map_err(SessionError::Mqtt)?;
    }
    HUB_CONNECTED.store(true, Ordering::Relaxed);

    // ask for the full twin, the answer arrives on the twin response topic and carries the current setting
    client
        .send_message(hub::TWIN_GET_TOPIC, b"", QualityOfService::QoS0, false)
        .await
        .map_err(SessionError::Mqtt)?;

    let framing = AlarmConfig::DEFAULT.event_framing;
    let mut ping_tick = Ticker::every(PING_INTERVAL);
    let mut keep_alive = KeepAlive::new();

    loop {
        // waiting for data reads nothing, only the receive below takes bytes off the socket
        let event = match select3(
            link.readable(),
            OUTBOUND_CHANNEL.receive(),
            ping_tick.next(),
        )
        .await
        {
            // one subscription per subscribe, so an ack carries a single reason code
            Either3::First(()) => match client.poll::<1>().await.map_err(SessionError::Mqtt)? {
                Event::Message(topic, payload) => {
                    SessionEvent::Inbound(Inbound::copy(topic, payload))
                }
                Event::Pingresp => SessionEvent::PingResponse,
                Event::Disconnect(reason) => return Err(SessionError::Mqtt(reason)),
                _ => SessionEvent::Ack,
            },
            Either3::Second(message) => SessionEvent::Outbound(message),
            Either3::Third(()) => SessionEvent::Ping,
        };

        match event {
            SessionEvent::Inbound(Some(inbound)) => {
                handle_inbound(&mut client, handler, &inbound).await?;
            }
            SessionEvent::Inbound(None) => warn!("Dropped an inbound message too large to handle"),
            SessionEvent::Outbound(message) => {
                match publish(&mut client, telemetry_topic, message, framing).await {
                    Ok(()) => info!("Published {:?}", message),
                    Err(PublishError::Encode) => warn!("Cannot encode {:?}", message),
                    // the message is gone, the next heartbeat or trigger goes out on the new session
                    Err(e) => return Err(SessionError::Publish(e)),
                }
            }
            SessionEvent::Ping => match keep_alive.on_interval() {
                PingAction::Send => client.send_ping().await.map_err(SessionError::Mqtt)?,
                PingAction::Expired => return Err(SessionError::PingUnanswered),
            },
            SessionEvent::PingResponse => {
                keep_alive.on_response();
                debug!("MQTT ping OK");
            }
            SessionEvent::Ack => debug!("Broker acknowledged a request"),
        }
    }
}

/// Encode a message and send it on the telemetry topic
async fn publish(
    client: &mut HubClient<'_, '_, '_>,
    topic: &str,
    message: TelemetryMessage,
    framing: EventFraming,
) -> Result<(), PublishError> {
    let encoded = message.encode(framing)?;
    client
        .send_message(topic, &encoded, QualityOfService::QoS0, false)
        .await
        .map(|_| ())
        .map_err(|e| {
            warn!("MQTT publish error: {:?}", e);
            PublishError::Transport
        })
}

/// Hand an inbound message to the command handler, and answer direct methods
async fn handle_inbound(
    client: &mut HubClient<'_, '_, '_>,
    handler: &Handler,
    inbound: &Inbound,
) -> Result<(), SessionError> {
    match hub::classify(&inbound.topic) {
        Some(InboundTopic::TwinPatch | InboundTopic::TwinResponse { status: 200 }) => {
            // rejected documents are logged by the handler and change nothing
            let _ = handler.handle_twin_document(&inbound.payload);
        }
        Some(InboundTopic::TwinResponse { status }) => {
            debug!("Twin request answered with status {}", status);
        }
        Some(InboundTopic::Method { name, request_id }) => {
            info!("Direct method {} invoked", name);
            let response = handler.invoke_method(name, &inbound.payload);
            let topic = hub::method_response_topic(response.status, request_id)
                .map_err(|_| SessionError::TopicTooLong)?;
            client
                .send_message(
                    &topic,
                    response.payload.as_bytes(),
                    QualityOfService::QoS0,
                    false,
                )
                .await
                .map_err(SessionError::Mqtt)?;
        }
        None => debug!("Ignoring message on {}", inbound.topic.as_str()),
    }
    Ok(())
}
