//! Actuator transition engine.
//!
//! Ramps one light attribute (brightness or color) between two values over a
//! fixed duration, one command per `command_delay` step. At most one ramp of
//! a given kind may run per light; a second request while one is in flight
//! is dropped with a warning rather than queued, so a burst of fast musical
//! segments can never build an unbounded backlog.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use prism_lights::{Light, Rgb};
use tokio::sync::Mutex as AsyncMutex;

use crate::color::{interpolate, ColorMode};
use crate::error::EngineError;

/// The two independently rampable attributes of a light.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionKind {
    Brightness,
    Color,
}

pub struct TransitionController {
    command_delay: Duration,
    color_mode: ColorMode,
    locks: Mutex<HashMap<(String, TransitionKind), Arc<AsyncMutex<()>>>>,
}

impl TransitionController {
    pub fn new(command_delay: Duration, color_mode: ColorMode) -> Self {
        TransitionController {
            command_delay,
            color_mode,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Ramp a light's brightness from `from` to `to` percent.
    ///
    /// Returns immediately (without touching the light) when a brightness
    /// ramp is already running for it. Percentages above 100 are rejected
    /// before any lock is taken.
    pub async fn transition_brightness(
        &self,
        light: Arc<dyn Light>,
        from: u8,
        to: u8,
        duration: Duration,
    ) -> Result<(), EngineError> {
        if from > 100 || to > 100 {
            return Err(EngineError::InvalidArgument(format!(
                "brightness must be 0..=100, got {from}..{to}"
            )));
        }

        let Some(_guard) = self.acquire(light.id(), TransitionKind::Brightness) else {
            return Ok(());
        };

        let steps = self.step_count(duration);
        if steps == 0 {
            self.write_brightness(&*light, to).await;
            return Ok(());
        }

        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            let value = (from as f32 + (to as f32 - from as f32) * t).round() as u8;
            self.write_brightness(&*light, value).await;
            tokio::time::sleep(self.command_delay).await;
        }

        Ok(())
    }

    /// Ramp a light's color from `from` to `to` through the configured
    /// interpolation mode. Same locking discipline as brightness.
    pub async fn transition_color(
        &self,
        light: Arc<dyn Light>,
        from: Rgb,
        to: Rgb,
        duration: Duration,
    ) -> Result<(), EngineError> {
        let Some(_guard) = self.acquire(light.id(), TransitionKind::Color) else {
            return Ok(());
        };

        let steps = self.step_count(duration);
        if steps == 0 {
            self.write_color(&*light, to).await;
            return Ok(());
        }

        for step in 1..=steps {
            let t = step as f32 / steps as f32;
            let color = interpolate(from, to, t, self.color_mode);
            self.write_color(&*light, color).await;
            tokio::time::sleep(self.command_delay).await;
        }

        Ok(())
    }

    fn step_count(&self, duration: Duration) -> u32 {
        (duration.as_millis() / self.command_delay.as_millis().max(1)) as u32
    }

    /// Take the per-(light, kind) lock, or report the contention and bow out.
    fn acquire(
        &self,
        light_id: &str,
        kind: TransitionKind,
    ) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        let lock = {
            let mut locks = self.locks.lock();
            Arc::clone(
                locks
                    .entry((light_id.to_string(), kind))
                    .or_default(),
            )
        };

        match lock.try_lock_owned() {
            Ok(guard) => Some(guard),
            Err(_) => {
                log::warn!("{kind:?} transition already running for {light_id}, dropping request");
                None
            }
        }
    }

    // Per-step failures are the driver's problem (it owns reconnection); a
    // dropped step is one missed frame, not a failed ramp.
    async fn write_brightness(&self, light: &dyn Light, value: u8) {
        if let Err(err) = light.set_brightness(value).await {
            log::debug!("brightness step dropped for {}: {err}", light.id());
        }
    }

    async fn write_color(&self, light: &dyn Light, color: Rgb) {
        if let Err(err) = light.set_color(color).await {
            log::debug!("color step dropped for {}: {err}", light.id());
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use prism_lights::LightError;

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Command {
        Brightness(u8),
        Color(Rgb),
    }

    struct RecordingLight {
        id: String,
        commands: Mutex<Vec<Command>>,
    }

    impl RecordingLight {
        fn new(id: &str) -> Arc<Self> {
            Arc::new(Self {
                id: id.to_string(),
                commands: Mutex::new(Vec::new()),
            })
        }

        fn commands(&self) -> Vec<Command> {
            self.commands.lock().clone()
        }
    }

    #[async_trait]
    impl Light for RecordingLight {
        fn id(&self) -> &str {
            &self.id
        }

        async fn set_power(&self, _on: bool) -> Result<(), LightError> {
            Ok(())
        }

        async fn set_brightness(&self, percent: u8) -> Result<(), LightError> {
            self.commands.lock().push(Command::Brightness(percent));
            Ok(())
        }

        async fn set_color(&self, color: Rgb) -> Result<(), LightError> {
            self.commands.lock().push(Command::Color(color));
            Ok(())
        }
    }

    fn controller(delay_ms: u64) -> Arc<TransitionController> {
        Arc::new(TransitionController::new(
            Duration::from_millis(delay_ms),
            ColorMode::LinearRgb,
        ))
    }

    #[tokio::test]
    async fn test_brightness_ramp_steps_and_lands_on_target() {
        let controller = controller(10);
        let light = RecordingLight::new("a");

        controller
            .transition_brightness(light.clone(), 0, 100, Duration::from_millis(50))
            .await
            .unwrap();

        let commands = light.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands.last(), Some(&Command::Brightness(100)));
    }

    #[tokio::test]
    async fn test_invalid_brightness_is_rejected_without_commands() {
        let controller = controller(10);
        let light = RecordingLight::new("a");

        let err = controller
            .transition_brightness(light.clone(), 0, 150, Duration::from_millis(50))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidArgument(_)));
        assert!(light.commands().is_empty());
    }

    #[tokio::test]
    async fn test_second_ramp_of_same_kind_is_dropped() {
        let controller = controller(10);
        let light = RecordingLight::new("a");

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            let light = light.clone();
            async move {
                controller
                    .transition_brightness(light, 0, 100, Duration::from_millis(100))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Drop policy: the overlapping request is a quiet no-op.
        controller
            .transition_brightness(light.clone(), 0, 50, Duration::from_millis(100))
            .await
            .unwrap();

        first.await.unwrap().unwrap();
        let commands = light.commands();
        assert_eq!(commands.len(), 10);
        assert_eq!(commands.last(), Some(&Command::Brightness(100)));

        // After the first ramp finishes the lock is free again.
        controller
            .transition_brightness(light.clone(), 100, 0, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(light.commands().len() > 10);
    }

    #[tokio::test]
    async fn test_color_and_brightness_ramps_run_concurrently() {
        let controller = controller(10);
        let light = RecordingLight::new("a");

        let brightness = tokio::spawn({
            let controller = Arc::clone(&controller);
            let light = light.clone();
            async move {
                controller
                    .transition_brightness(light, 0, 100, Duration::from_millis(60))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller
            .transition_color(
                light.clone(),
                Rgb::new(0, 0, 0),
                Rgb::new(255, 255, 255),
                Duration::from_millis(40),
            )
            .await
            .unwrap();
        brightness.await.unwrap().unwrap();

        let commands = light.commands();
        assert!(commands.iter().any(|c| matches!(c, Command::Color(_))));
        assert!(commands.iter().any(|c| matches!(c, Command::Brightness(_))));
    }

    #[tokio::test]
    async fn test_sub_step_duration_jumps_to_target() {
        let controller = controller(50);
        let light = RecordingLight::new("a");

        controller
            .transition_brightness(light.clone(), 20, 80, Duration::from_millis(10))
            .await
            .unwrap();

        assert_eq!(light.commands(), vec![Command::Brightness(80)]);
    }

    #[tokio::test]
    async fn test_different_lights_do_not_contend() {
        let controller = controller(10);
        let a = RecordingLight::new("a");
        let b = RecordingLight::new("b");

        let first = tokio::spawn({
            let controller = Arc::clone(&controller);
            let a = a.clone();
            async move {
                controller
                    .transition_brightness(a, 0, 100, Duration::from_millis(60))
                    .await
            }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;

        controller
            .transition_brightness(b.clone(), 0, 100, Duration::from_millis(30))
            .await
            .unwrap();
        first.await.unwrap().unwrap();

        assert!(!a.commands().is_empty());
        assert!(!b.commands().is_empty());
    }
}
