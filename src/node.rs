//! Duty-cycle orchestration: read, encode, transmit, sleep.
//!
//! [`SensorNode`] owns every collaborator and runs one cycle per wake-up:
//!
//! 1. Collect one reading per channel and the auxiliary status byte
//! 2. Encode the frame and compute its CRC-16
//! 3. Transmit it in the format of the configured [`GatewayProfile`]
//! 4. Let the radio settle, then put it to sleep
//! 5. Power down for the configured number of watchdog ticks
//!
//! A failed transmission still ends in step 5: the node never stays awake
//! retrying, the next cycle is the retry.
//!
//! ## Example
//!
//! ```rust,ignore
//! lora_sensor_node::declare_watchdog_ticks!();
//!
//! let board = Board { bus, aux, radio, delay, power, supply, ticks: &WATCHDOG_TICKS };
//! let device_id = identity::load_or_provision(&mut eeprom, &DeviceId::DEFAULT)?;
//! let mut node = SensorNode::new(NodeConfig::default(), device_id, board)?;
//! node.start()?;
//! loop {
//!     let _ = node.run_cycle();
//! }
//! ```

use embedded_hal::delay::DelayNs;

use crate::config::{ConfigError, GatewayProfile, NodeConfig};
use crate::consts::STARTUP_SETTLE_MS;
use crate::frame::{FrameError, FrameLayout, TelemetryFrame, WireFrame};
use crate::identity::DeviceId;
use crate::link::{self, Delivery, LinkError, Radio};
use crate::sensors::{self, AuxSensor, TemperatureBus};
use crate::sleep::{PowerControl, SleepController, SleepError, WatchdogTicks};
use crate::supply::SupplyMonitor;
use crate::text;

/// Errors raised by the duty cycle.
///
/// `E` is the radio driver's error type.
#[derive(Debug, thiserror::Error)]
pub enum NodeError<E: core::fmt::Debug> {
    /// The configuration was rejected.
    #[error("invalid configuration: {0}")]
    Config(ConfigError),
    /// The frame could not be built or rendered.
    #[error("frame error: {0}")]
    Frame(FrameError),
    /// The sleep controller was used out of order.
    #[error("sleep error: {0}")]
    Sleep(SleepError),
    /// The radio failed.
    #[error("radio link error: {0}")]
    Link(LinkError<E>),
}

impl<E: core::fmt::Debug> From<ConfigError> for NodeError<E> {
    fn from(err: ConfigError) -> Self {
        NodeError::Config(err)
    }
}

impl<E: core::fmt::Debug> From<FrameError> for NodeError<E> {
    fn from(err: FrameError) -> Self {
        NodeError::Frame(err)
    }
}

impl<E: core::fmt::Debug> From<SleepError> for NodeError<E> {
    fn from(err: SleepError) -> Self {
        NodeError::Sleep(err)
    }
}

impl<E: core::fmt::Debug> From<LinkError<E>> for NodeError<E> {
    fn from(err: LinkError<E>) -> Self {
        NodeError::Link(err)
    }
}

/// Summary of one transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt-0-3", derive(defmt::Format))]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u32,
    /// Bytes handed to the radio per transmission.
    pub sent_len: usize,
    /// CRC-16 of the binary payload (computed even when not transmitted).
    pub checksum: u16,
    /// How the frame left the node.
    pub delivery: Delivery,
}

/// The hardware a [`SensorNode`] runs on.
#[derive(Debug)]
pub struct Board<B, X, R, P, V, D> {
    /// Temperature probes.
    pub bus: B,
    /// Auxiliary status input.
    pub aux: X,
    /// LoRa transceiver.
    pub radio: R,
    /// Millisecond delay for reply polling and settling.
    pub delay: D,
    /// MCU power management.
    pub power: P,
    /// Supply voltage monitor.
    pub supply: V,
    /// Counter bumped by the watchdog ISR.
    pub ticks: &'static WatchdogTicks,
}

/// A battery powered telemetry node.
#[derive(Debug)]
pub struct SensorNode<B, X, R, P, V, D>
where
    P: PowerControl,
    V: SupplyMonitor,
{
    config: NodeConfig,
    layout: FrameLayout,
    device_id: DeviceId,
    bus: B,
    aux: X,
    radio: R,
    delay: D,
    sleeper: SleepController<P, V>,
    cycle: u32,
}

impl<B, X, R, P, V, D> SensorNode<B, X, R, P, V, D>
where
    B: TemperatureBus,
    X: AuxSensor,
    R: Radio,
    P: PowerControl,
    V: SupplyMonitor,
    D: DelayNs,
{
    /// Validates `config` and assembles the node.
    ///
    /// # Errors
    /// [`NodeError::Config`] if the configuration cannot produce a frame for
    /// its gateway profile.
    pub fn new(
        config: NodeConfig,
        device_id: DeviceId,
        board: Board<B, X, R, P, V, D>,
    ) -> Result<Self, NodeError<R::Error>> {
        let layout = config.validate()?;
        let sleeper = SleepController::new(board.power, board.supply, board.ticks, config.sleep);
        Ok(Self {
            config,
            layout,
            device_id,
            bus: board.bus,
            aux: board.aux,
            radio: board.radio,
            delay: board.delay,
            sleeper,
            cycle: 0,
        })
    }

    /// Brings the node up: sleep controller initialized, radio configured and
    /// put to sleep after [`STARTUP_SETTLE_MS`], then the startup sleep.
    pub fn start(&mut self) -> Result<(), NodeError<R::Error>> {
        info!("node starting, device id {:?}", self.device_id.0);
        self.sleeper.initialize()?;
        self.radio
            .configure(&self.config.radio)
            .map_err(LinkError::Configure)?;
        debug!(
            "radio: {} dBm, sync word {}",
            self.config.radio.tx_power_dbm,
            self.config.radio.sync_word
        );
        self.delay.delay_ms(STARTUP_SETTLE_MS);
        self.radio.sleep().map_err(LinkError::Sleep)?;
        self.sleeper.sleep(self.config.init_sleep_cycles)?;
        Ok(())
    }

    /// Reads, encodes and transmits one frame, then puts the radio to sleep.
    ///
    /// The radio is put to sleep even if the transmission failed.
    pub fn transmit_cycle(&mut self) -> Result<CycleReport, NodeError<R::Error>> {
        self.cycle = self.cycle.wrapping_add(1);
        info!("cycle {}", self.cycle);

        let readings = sensors::collect_readings(&mut self.bus, self.layout.channels());
        let aux_status = self.aux.status();
        let frame = TelemetryFrame::new(
            self.layout,
            self.config.node_id,
            self.device_id,
            &readings,
            aux_status,
        )?;
        let wire = frame.encode();
        debug!("payload: {:?}", wire.payload());
        debug!("crc: {}", wire.checksum());

        let sent = self.transmit(&frame, &wire);
        self.delay.delay_ms(self.config.settle_ms);
        let slept = self.radio.sleep().map_err(LinkError::Sleep);
        let (sent_len, delivery) = sent?;
        slept?;

        Ok(CycleReport {
            cycle: self.cycle,
            sent_len,
            checksum: wire.checksum(),
            delivery,
        })
    }

    /// Runs one full duty cycle: [`transmit_cycle`](Self::transmit_cycle)
    /// followed by the configured sleep.
    ///
    /// The sleep happens whatever the transmission outcome, which is returned
    /// afterwards. With a guarded sleep profile and a critically low supply
    /// this never returns.
    pub fn run_cycle(&mut self) -> Result<CycleReport, NodeError<R::Error>> {
        let report = self.transmit_cycle();
        if report.is_err() {
            warn!("cycle {} failed to transmit", self.cycle);
        }
        self.sleeper.sleep(self.config.sleep_cycles)?;
        report
    }

    fn transmit(
        &mut self,
        frame: &TelemetryFrame,
        wire: &WireFrame,
    ) -> Result<(usize, Delivery), NodeError<R::Error>> {
        match self.config.gateway {
            GatewayProfile::Binary { await_echo } => {
                let bytes = wire.to_bytes();
                let delivery = if await_echo {
                    link::send_with_echo_check(
                        &mut self.radio,
                        &mut self.delay,
                        &bytes,
                        self.config.node_id,
                        self.config.reply_timeout_ms,
                    )?
                } else {
                    link::send_frame(&mut self.radio, &bytes)?
                };
                Ok((bytes.len(), delivery))
            }
            GatewayProfile::Text => {
                let rendered = text::render(frame)?;
                debug!("text frame: {} bytes, crc not transmitted", rendered.len());
                let delivery = link::send_frame(&mut self.radio, &rendered)?;
                Ok((rendered.len(), delivery))
            }
        }
    }

    /// Deployment configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Frame geometry.
    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    /// Provisioned device id.
    pub fn device_id(&self) -> DeviceId {
        self.device_id
    }

    /// Number of cycles run so far.
    pub fn cycle(&self) -> u32 {
        self.cycle
    }

    /// The radio, e.g. to inspect its statistics.
    pub fn radio(&self) -> &R {
        &self.radio
    }

    /// The sleep controller.
    pub fn sleep_controller(&self) -> &SleepController<P, V> {
        &self.sleeper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RadioConfig;
    use crate::crc;
    use crate::sleep::SleepState;
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    struct FixedBus(StdVec<Option<f32>>);

    impl TemperatureBus for FixedBus {
        fn device_count(&mut self) -> usize {
            self.0.len()
        }

        fn read_celsius(&mut self, index: usize) -> Option<f32> {
            self.0[index]
        }
    }

    struct FixedAux(u8);

    impl AuxSensor for FixedAux {
        fn status(&mut self) -> u8 {
            self.0
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct RadioFault;

    #[derive(Default)]
    struct MockRadio {
        sent: StdVec<StdVec<u8>>,
        replies: VecDeque<StdVec<u8>>,
        fail_sends: bool,
        sleeps: usize,
        configured: Option<RadioConfig>,
        fail_configure: bool,
    }

    impl Radio for MockRadio {
        type Error = RadioFault;

        fn configure(&mut self, config: &RadioConfig) -> Result<(), RadioFault> {
            if self.fail_configure {
                return Err(RadioFault);
            }
            self.configured = Some(*config);
            Ok(())
        }

        fn send(&mut self, bytes: &[u8]) -> Result<(), RadioFault> {
            if self.fail_sends {
                return Err(RadioFault);
            }
            self.sent.push(bytes.to_vec());
            Ok(())
        }

        fn try_receive(&mut self, buf: &mut [u8]) -> nb::Result<usize, RadioFault> {
            match self.replies.pop_front() {
                Some(reply) => {
                    buf[..reply.len()].copy_from_slice(&reply);
                    Ok(reply.len())
                }
                None => Err(nb::Error::WouldBlock),
            }
        }

        fn sleep(&mut self) -> Result<(), RadioFault> {
            self.sleeps += 1;
            Ok(())
        }
    }

    // Every power-down is ended by exactly one watchdog tick.
    struct TickingPower {
        ticks: &'static WatchdogTicks,
        power_downs: usize,
    }

    impl PowerControl for TickingPower {
        fn configure_watchdog(&mut self) {}
        fn reset_watchdog(&mut self) {}
        fn enable_power_down(&mut self) {}
        fn set_adc_enabled(&mut self, _enabled: bool) {}
        fn release_analog_pin(&mut self) {}
        fn disable_interrupts(&mut self) {}
        fn disable_brown_out(&mut self) {}

        fn power_down(&mut self) {
            self.power_downs += 1;
            self.ticks.on_interrupt();
        }
    }

    struct Vcc(u8);

    impl SupplyMonitor for Vcc {
        fn supply_decivolts(&mut self) -> u8 {
            self.0
        }
    }

    #[derive(Default)]
    struct CountingDelay {
        ns: u64,
    }

    impl DelayNs for CountingDelay {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    type TestNode = SensorNode<FixedBus, FixedAux, MockRadio, TickingPower, Vcc, CountingDelay>;

    fn node(config: NodeConfig, ticks: &'static WatchdogTicks, radio: MockRadio) -> TestNode {
        let board = Board {
            bus: FixedBus(vec![Some(23.47), Some(19.06)]),
            aux: FixedAux(1),
            radio,
            delay: CountingDelay::default(),
            power: TickingPower {
                ticks,
                power_downs: 0,
            },
            supply: Vcc(33),
            ticks,
        };
        SensorNode::new(config, DeviceId::DEFAULT, board).unwrap()
    }

    const REFERENCE_PAYLOAD: [u8; 17] = [
        b'<', b'1', b'2', b'3', b'4', b'>', 19, 11, 3, 18, 12, 0, 23, 47, 19, 6, 1,
    ];

    #[test]
    fn test_binary_cycle_with_echo() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let radio = MockRadio {
            replies: VecDeque::from([b"<1234>".to_vec()]),
            ..MockRadio::default()
        };
        let mut node = node(NodeConfig::binary_gateway(), &TICKS, radio);

        let report = node.transmit_cycle().unwrap();

        let expected_crc = crc::crc16(&REFERENCE_PAYLOAD);
        assert_eq!(
            report,
            CycleReport {
                cycle: 1,
                sent_len: 19,
                checksum: expected_crc,
                delivery: Delivery::Acknowledged,
            }
        );
        let radio = node.radio();
        assert_eq!(radio.sent.len(), 1);
        let wire = WireFrame::from_bytes(&radio.sent[0]).unwrap();
        assert_eq!(wire.payload(), REFERENCE_PAYLOAD);
        assert!(wire.verify());
        assert_eq!(radio.sleeps, 1);
    }

    #[test]
    fn test_binary_cycle_without_echo_resends() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            reply_timeout_ms: 5,
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());

        let report = node.transmit_cycle().unwrap();

        assert_eq!(report.delivery, Delivery::Resent);
        assert_eq!(node.radio().sent.len(), 2);
        assert_eq!(node.radio().sent[0], node.radio().sent[1]);
    }

    #[test]
    fn test_fire_and_forget_profile() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            gateway: GatewayProfile::Binary { await_echo: false },
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());

        let report = node.transmit_cycle().unwrap();
        assert_eq!(report.delivery, Delivery::Sent);
        assert_eq!(node.radio().sent.len(), 1);
    }

    #[test]
    fn test_text_cycle() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let mut node = node(NodeConfig::text_gateway(), &TICKS, MockRadio::default());

        let report = node.transmit_cycle().unwrap();

        let expected: &[u8] =
            br#"<1234>{"number":"191103181200","data":{"t0":"23.47","t1":"19.6","h":"1","l":"0"}}"#;
        assert_eq!(node.radio().sent, [expected.to_vec()]);
        assert_eq!(report.sent_len, expected.len());
        assert_eq!(report.delivery, Delivery::Sent);
        assert_eq!(report.checksum, crc::crc16(&REFERENCE_PAYLOAD));
    }

    #[test]
    fn test_invalid_config_rejected() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let board = Board {
            bus: FixedBus(vec![]),
            aux: FixedAux(0),
            radio: MockRadio::default(),
            delay: CountingDelay::default(),
            power: TickingPower {
                ticks: &TICKS,
                power_downs: 0,
            },
            supply: Vcc(33),
            ticks: &TICKS,
        };
        let config = NodeConfig {
            channels: 1,
            ..NodeConfig::text_gateway()
        };
        assert!(matches!(
            SensorNode::new(config, DeviceId::DEFAULT, board),
            Err(NodeError::Config(ConfigError::Frame(
                FrameError::TextNeedsTwoChannels(1)
            )))
        ));
    }

    #[test]
    fn test_start_configures_radio_and_settles() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            radio: RadioConfig {
                frequency_mhz: 915.0,
                tx_power_dbm: 20,
                sync_word: 0x12,
            },
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());
        assert_eq!(node.radio().configured, None);

        node.start().unwrap();

        assert_eq!(node.radio().configured, Some(config.radio));
        assert_eq!(node.radio().sleeps, 1);
        assert_eq!(node.delay.ns, u64::from(STARTUP_SETTLE_MS) * 1_000_000);
    }

    #[test]
    fn test_start_reports_configure_failure() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let radio = MockRadio {
            fail_configure: true,
            ..MockRadio::default()
        };
        let mut node = node(NodeConfig::binary_gateway(), &TICKS, radio);

        assert!(matches!(
            node.start(),
            Err(NodeError::Link(LinkError::Configure(RadioFault)))
        ));
        assert_eq!(node.radio().sleeps, 0);
        assert_eq!(node.sleep_controller().power().power_downs, 0);
    }

    #[test]
    fn test_start_and_run_cycles() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            gateway: GatewayProfile::Binary { await_echo: false },
            sleep_cycles: 3,
            init_sleep_cycles: 2,
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());

        node.start().unwrap();
        assert_eq!(node.sleep_controller().power().power_downs, 2);
        assert_eq!(node.radio().sleeps, 1);

        assert_eq!(node.run_cycle().unwrap().cycle, 1);
        assert_eq!(node.run_cycle().unwrap().cycle, 2);
        assert_eq!(node.cycle(), 2);
        assert_eq!(node.sleep_controller().power().power_downs, 2 + 3 + 3);
        assert_eq!(node.sleep_controller().state(), SleepState::Awake);
        assert_eq!(node.radio().sent.len(), 2);
    }

    #[test]
    fn test_failed_transmission_still_sleeps() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let radio = MockRadio {
            fail_sends: true,
            ..MockRadio::default()
        };
        let mut node = node(NodeConfig::binary_gateway(), &TICKS, radio);
        node.start().unwrap();

        let result = node.run_cycle();

        assert!(matches!(
            result,
            Err(NodeError::Link(LinkError::Send(RadioFault)))
        ));
        assert_eq!(node.radio().sleeps, 2);
        assert_eq!(node.sleep_controller().power().power_downs, 2);
    }

    #[test]
    fn test_run_cycle_before_start_fails_on_sleep() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            gateway: GatewayProfile::Binary { await_echo: false },
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());

        assert!(matches!(
            node.run_cycle(),
            Err(NodeError::Sleep(SleepError::NotInitialized))
        ));
        assert_eq!(node.radio().sent.len(), 1);
    }

    #[test]
    fn test_missing_sensor_keeps_frame_length() {
        static TICKS: WatchdogTicks = WatchdogTicks::new();
        let config = NodeConfig {
            gateway: GatewayProfile::Binary { await_echo: false },
            ..NodeConfig::binary_gateway()
        };
        let mut node = node(config, &TICKS, MockRadio::default());
        node.bus = FixedBus(vec![None]);

        let report = node.transmit_cycle().unwrap();

        assert_eq!(report.sent_len, 19);
        let wire = WireFrame::from_bytes(&node.radio().sent[0]).unwrap();
        assert_eq!(wire.payload()[12..16], [0, 0, 0, 0]);
    }
}
