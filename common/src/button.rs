use std::{cell::RefCell, rc::Rc};

use tracing::{debug, warn};

use crate::{
    callback::Handler,
    config::ButtonConfig,
    hal::{Clock, InputPin},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonPhase {
    Idle,
    Unstable,
    HeldShort,
    HeldLong,
}

/// Short press fires on release so that a long press can still win while
/// the button is held. Each press/release cycle fires exactly one of them.
pub struct ButtonPress<P> {
    name: &'static str,
    pin: P,
    clock: Rc<dyn Clock>,
    min_change_ms: u32,
    long_press_ms: u32,
    short_press: Handler,
    long_press: Handler,
    pressed_last_time: bool,
    change_ms: u32,
    press_ms: Option<u32>,
    press_handled: bool,
}

impl<P: InputPin> ButtonPress<P> {
    pub fn new(name: &'static str, pin: P, clock: Rc<dyn Clock>, config: &ButtonConfig) -> Self {
        let change_ms = clock.now_ms();
        Self {
            name,
            pin,
            clock,
            min_change_ms: config.min_change_ms,
            long_press_ms: config.long_press_ms,
            short_press: Handler::new(),
            long_press: Handler::new(),
            pressed_last_time: false,
            change_ms,
            press_ms: None,
            press_handled: false,
        }
    }

    pub fn register_short_press<T: 'static>(&mut self, owner: &Rc<RefCell<T>>, method: fn(&mut T)) {
        self.short_press.register(owner, method);
    }

    pub fn register_long_press<T: 'static>(
        &mut self,
        owner: &Rc<RefCell<T>>,
        method: fn(&mut T),
        press_ms: u32,
    ) {
        self.long_press.register(owner, method);
        self.long_press_ms = press_ms;
    }

    pub fn short_press_handler(&mut self) -> &mut Handler {
        &mut self.short_press
    }

    pub fn long_press_handler(&mut self) -> &mut Handler {
        &mut self.long_press
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn phase(&self) -> ButtonPhase {
        let settling = self.clock.now_ms().wrapping_sub(self.change_ms) < self.min_change_ms;
        match (self.pressed_last_time, self.press_ms) {
            (true, None) | (false, Some(_)) => ButtonPhase::Unstable,
            _ if settling => ButtonPhase::Unstable,
            (false, None) => ButtonPhase::Idle,
            (true, Some(_)) if self.press_handled => ButtonPhase::HeldLong,
            (true, Some(_)) => ButtonPhase::HeldShort,
        }
    }

    pub fn check_button(&mut self, delay: &mut u32) {
        *delay = self.check_button_press();
    }

    fn check_button_press(&mut self) -> u32 {
        let pressed = match self.pin.is_low() {
            Ok(low) => low,
            Err(err) => {
                warn!(button = self.name, "button read failed: {err:?}");
                self.pressed_last_time
            }
        };
        let now = self.clock.now_ms();

        if pressed != self.pressed_last_time {
            self.pressed_last_time = pressed;
            self.change_ms = now;
            return self.min_change_ms;
        }

        let since_change = now.wrapping_sub(self.change_ms);
        if since_change < self.min_change_ms {
            return self.min_change_ms - since_change;
        }

        if pressed {
            let Some(press_ms) = self.press_ms else {
                self.press_ms = Some(self.change_ms);
                self.press_handled = false;
                return self.min_change_ms;
            };

            if self.press_handled || !self.long_press.has_handler() {
                return self.min_change_ms;
            }

            if now.wrapping_sub(press_ms) > self.long_press_ms {
                debug!(button = self.name, "long press");
                self.press_handled = true;
                self.long_press.invoke();
            }
            return self.min_change_ms;
        }

        if self.press_ms.is_none() {
            self.press_handled = false;
            return self.min_change_ms;
        }

        self.press_ms = None;
        if self.press_handled {
            self.press_handled = false;
            return self.min_change_ms;
        }

        debug!(button = self.name, "short press");
        self.short_press.invoke();
        self.min_change_ms
    }
}
