//! esp-radio station mode behind the [`Association`] seam.

use alloc::string::String;

use aquamon_core::{Association, AssociationStatus};
use embassy_executor::Spawner;
use embassy_net::{Config as NetConfig, Stack, StackResources};
use esp_hal::peripherals::WIFI;
use esp_hal::rng::Rng;
use esp_radio::wifi::{self, ClientConfig, ModeConfig, WifiController, WifiDevice};
use log::{info, warn};
use static_cell::StaticCell;

static RADIO_CONTROLLER: StaticCell<esp_radio::Controller<'static>> = StaticCell::new();
static NET_RESOURCES: StaticCell<StackResources<4>> = StaticCell::new();

#[derive(Debug)]
pub enum WifiInitError {
    Radio(esp_radio::InitializationError),
    Driver(wifi::WifiError),
    Spawn,
}

/// Bring up the radio and the DHCP network stack.
///
/// Spawns the stack runner; the returned association drives the connection.
pub fn start(
    spawner: &Spawner,
    wifi_peripheral: WIFI<'static>,
) -> Result<(EspAssociation, Stack<'static>), WifiInitError> {
    let radio = esp_radio::init().map_err(WifiInitError::Radio)?;
    let radio = RADIO_CONTROLLER.init(radio);

    let (controller, interfaces) =
        wifi::new(radio, wifi_peripheral, Default::default()).map_err(WifiInitError::Driver)?;

    let rng = Rng::new();
    let seed = (rng.random() as u64) << 32 | rng.random() as u64;

    let resources = NET_RESOURCES.init(StackResources::new());
    let (stack, runner) = embassy_net::new(
        interfaces.sta,
        NetConfig::dhcpv4(Default::default()),
        resources,
        seed,
    );
    spawner
        .spawn(net_task(runner))
        .map_err(|_| WifiInitError::Spawn)?;

    Ok((EspAssociation::new(controller, stack), stack))
}

#[embassy_executor::task]
async fn net_task(mut runner: embassy_net::Runner<'static, WifiDevice<'static>>) {
    runner.run().await;
}

/// Station-mode association.
///
/// Only counts as connected once DHCP has handed out an address, so the first
/// request after `connect` has somewhere to go.
pub struct EspAssociation {
    controller: WifiController<'static>,
    stack: Stack<'static>,
    rejected: bool,
}

impl EspAssociation {
    pub fn new(controller: WifiController<'static>, stack: Stack<'static>) -> Self {
        Self {
            controller,
            stack,
            rejected: false,
        }
    }
}

impl Association for EspAssociation {
    async fn begin(&mut self, ssid: &str, password: &str) {
        self.rejected = false;

        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(String::from(ssid))
                .with_password(String::from(password)),
        );

        if !matches!(self.controller.is_started(), Ok(true)) {
            if let Err(e) = self.controller.set_config(&client_config) {
                warn!("WiFi set_config error: {:?}", e);
                self.rejected = true;
                return;
            }
            info!("Starting WiFi STA");
            if let Err(e) = self.controller.start_async().await {
                warn!("WiFi start error: {:?}", e);
                self.rejected = true;
                return;
            }
        }

        if let Err(e) = self.controller.connect_async().await {
            warn!("WiFi connect error: {:?}", e);
            self.rejected = true;
        }
    }

    fn status(&mut self) -> AssociationStatus {
        if self.rejected {
            return AssociationStatus::ConnectFailed;
        }
        match self.controller.is_connected() {
            Ok(true) if self.stack.is_config_up() => AssociationStatus::Connected,
            Ok(true) => AssociationStatus::Connecting,
            Ok(false) if matches!(self.controller.is_started(), Ok(true)) => {
                AssociationStatus::Connecting
            }
            _ => AssociationStatus::Idle,
        }
    }
}
