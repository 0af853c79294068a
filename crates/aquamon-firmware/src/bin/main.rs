#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use aquamon_core::{CLOCK, NetworkLink, TelemetryAgent, UploadSession};
use aquamon_firmware::hardware::{create_i2c_bus, power_up_probes, share_i2c_bus};
use aquamon_firmware::probes::Sht40Pair;
use aquamon_firmware::shared_i2c::SharedI2c;
use aquamon_firmware::transport::TcpTransport;
use aquamon_firmware::{secrets, wifi};
use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Timer};
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{error, info, warn};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Park the agent for good. Nothing is retried after this.
async fn halt() -> ! {
    error!("Agent halted");
    loop {
        Timer::after(Duration::from_secs(3600)).await;
    }
}

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(log::LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized!");

    let agent_config = secrets::config();
    if agent_config.internet.ssid.is_empty() {
        warn!("WIFI_SSID was not set at build time");
    }

    let (association, stack) = match wifi::start(&spawner, peripherals.WIFI) {
        Ok(started) => started,
        Err(e) => {
            error!("WiFi init failed: {:?}", e);
            halt().await
        }
    };

    let bus = match create_i2c_bus(peripherals.I2C0, peripherals.GPIO12, peripherals.GPIO11) {
        Ok(bus) => share_i2c_bus(bus),
        Err(e) => {
            error!("I2C init failed: {:?}", e);
            halt().await
        }
    };
    power_up_probes(SharedI2c::new(bus)).await;
    let probes = Sht40Pair::new(SharedI2c::new(bus), SharedI2c::new(bus));

    let session = match UploadSession::new(TcpTransport::new(stack), &agent_config.server) {
        Ok(session) => session,
        Err(e) => {
            error!("Invalid server address {}: {}", secrets::SERVER_ADDRESS, e);
            halt().await
        }
    };

    let schedule = agent_config.schedule;
    let mut link = NetworkLink::new(
        association,
        embassy_time::Delay,
        schedule.connect_poll_interval_ms,
    );
    let mut agent: TelemetryAgent<'_, _, _> = TelemetryAgent::new(session, probes, &CLOCK, schedule);

    let sample_interval = Duration::from_secs(u64::from(schedule.sample_interval_secs));
    loop {
        if !link.is_connected() {
            if let Err(e) = link.connect(&agent_config.internet, ()).await {
                error!("WiFi: {}", e);
                halt().await;
            }
            if let Some(v4) = stack.config_v4() {
                info!("WiFi up, address {}", v4.address);
            }
        }

        let started = Instant::now();
        let report = agent.tick(started.as_secs()).await;
        if let Some(status) = report.upload {
            info!("Upload status {}", status);
        }

        Timer::at(started + sample_interval).await;
    }
}
