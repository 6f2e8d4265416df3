/*
 * This file is part of Legionfan.
 *
 * Copyright (C) 2025 Legionfan contributors
 *
 * Legionfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Legionfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Legionfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Embedded controller sensor access through the Super I/O index/data
//! port pair. Reading needs root (`/dev/port`).

use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;

use serde::Serialize;

use crate::error::{FanError, Result};

const DEV_PORT: &str = "/dev/port";

pub const EC_ADDR_PORT: u16 = 0x2E;
pub const EC_DATA_PORT: u16 = 0x2F;

const REG_ADDR_HI: u8 = 0x11;
const REG_ADDR_LO: u8 = 0x10;
const REG_DATA: u8 = 0x12;

pub const CPU_TEMP: u16 = 0xC538;
pub const GPU_TEMP: u16 = 0xC539;
pub const VRM_TEMP: u16 = 0xC53A;
pub const FAN1_RPM_LSB: u16 = 0xC5E0;
pub const FAN1_RPM_MSB: u16 = 0xC5E1;
pub const FAN2_RPM_LSB: u16 = 0xC5E2;
pub const FAN2_RPM_MSB: u16 = 0xC5E3;

const MAX_PLAUSIBLE_RPM: u16 = 20_000;

/// Raw byte-wide port access.
pub trait PortIo {
    fn outb(&mut self, port: u16, value: u8) -> Result<()>;
    fn inb(&mut self, port: u16) -> Result<u8>;
}

/// `/dev/port`: the file offset is the port number.
pub struct DevPort {
    file: File,
}

impl DevPort {
    pub fn open() -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(DEV_PORT)
            .map_err(|e| FanError::ec(format!("cannot open {}: {}", DEV_PORT, e)))?;
        Ok(Self { file })
    }
}

impl PortIo for DevPort {
    fn outb(&mut self, port: u16, value: u8) -> Result<()> {
        self.file
            .write_at(&[value], port as u64)
            .map_err(|e| FanError::ec(format!("write to port {:#x} failed: {}", port, e)))?;
        Ok(())
    }

    fn inb(&mut self, port: u16) -> Result<u8> {
        let mut buf = [0u8; 1];
        self.file
            .read_at(&mut buf, port as u64)
            .map_err(|e| FanError::ec(format!("read from port {:#x} failed: {}", port, e)))?;
        Ok(buf[0])
    }
}

/// Zero for the values the EC reports when a fan is absent or the read
/// was torn.
pub fn sanitize_rpm(raw: u16) -> i32 {
    if raw == 0 || raw == 0xFFFF || raw > MAX_PLAUSIBLE_RPM {
        0
    } else {
        raw as i32
    }
}

pub struct EcReader<P: PortIo> {
    io: P,
}

impl EcReader<DevPort> {
    pub fn open() -> Result<Self> {
        Ok(Self::new(DevPort::open()?))
    }
}

impl<P: PortIo> EcReader<P> {
    pub fn new(io: P) -> Self {
        Self { io }
    }

    fn select(&mut self, reg: u8, value: u8) -> Result<()> {
        self.io.outb(EC_ADDR_PORT, reg)?;
        self.io.outb(EC_DATA_PORT, value)
    }

    pub fn read_byte(&mut self, addr: u16) -> Result<u8> {
        let [hi, lo] = addr.to_be_bytes();
        self.select(REG_ADDR_HI, hi)?;
        self.select(REG_ADDR_LO, lo)?;
        self.io.outb(EC_ADDR_PORT, REG_DATA)?;
        self.io.inb(EC_DATA_PORT)
    }

    pub fn read_word(&mut self, lsb: u16, msb: u16) -> Result<u16> {
        let lo = self.read_byte(lsb)?;
        let hi = self.read_byte(msb)?;
        Ok(u16::from_le_bytes([lo, hi]))
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait SensorSource {
    fn read_cpu_temp(&mut self) -> Result<i32>;
    fn read_gpu_temp(&mut self) -> Result<i32>;
    fn read_vrm_temp(&mut self) -> Result<i32>;
    fn read_fan1_rpm(&mut self) -> Result<i32>;
    fn read_fan2_rpm(&mut self) -> Result<i32>;
}

impl<P: PortIo> SensorSource for EcReader<P> {
    fn read_cpu_temp(&mut self) -> Result<i32> {
        Ok(self.read_byte(CPU_TEMP)? as i32)
    }

    fn read_gpu_temp(&mut self) -> Result<i32> {
        Ok(self.read_byte(GPU_TEMP)? as i32)
    }

    fn read_vrm_temp(&mut self) -> Result<i32> {
        Ok(self.read_byte(VRM_TEMP)? as i32)
    }

    fn read_fan1_rpm(&mut self) -> Result<i32> {
        Ok(sanitize_rpm(self.read_word(FAN1_RPM_LSB, FAN1_RPM_MSB)?))
    }

    fn read_fan2_rpm(&mut self) -> Result<i32> {
        Ok(sanitize_rpm(self.read_word(FAN2_RPM_LSB, FAN2_RPM_MSB)?))
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SensorReadings {
    pub cpu_temp: i32,
    pub gpu_temp: i32,
    pub vrm_temp: i32,
    pub fan1_rpm: i32,
    pub fan2_rpm: i32,
}

impl SensorReadings {
    pub fn read(source: &mut dyn SensorSource) -> Result<Self> {
        Ok(Self {
            cpu_temp: source.read_cpu_temp()?,
            gpu_temp: source.read_gpu_temp()?,
            vrm_temp: source.read_vrm_temp()?,
            fan1_rpm: source.read_fan1_rpm()?,
            fan2_rpm: source.read_fan2_rpm()?,
        })
    }
}
