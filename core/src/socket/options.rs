//! Per-socket mode flags and tunable buffer sizes.

use bitflags::bitflags;

use crate::error::{NetError, NetResult};

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct SocketFlags: u8 {
        const O_NONBLOCK = 1 << 0;
        const SHUT_RD    = 1 << 1;
        const SHUT_WR    = 1 << 2;
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SocketOptions {
    pub recv_buf_size: usize,
    pub send_buf_size: usize,
}

impl SocketOptions {
    pub const RECV_BUF_DEFAULT: usize = 16384;
    pub const SEND_BUF_DEFAULT: usize = 16384;
    pub const BUF_MIN: usize = 512;
    pub const BUF_MAX: usize = 1 << 20;

    pub const fn new() -> Self {
        Self { recv_buf_size: Self::RECV_BUF_DEFAULT, send_buf_size: Self::SEND_BUF_DEFAULT }
    }

    pub fn set_recv_buf_size(&mut self, size: usize) -> NetResult<()> {
        self.recv_buf_size = Self::clamp(size)?;
        Ok(())
    }

    pub fn set_send_buf_size(&mut self, size: usize) -> NetResult<()> {
        self.send_buf_size = Self::clamp(size)?;
        Ok(())
    }

    fn clamp(size: usize) -> NetResult<usize> {
        if size < Self::BUF_MIN || size > Self::BUF_MAX {
            return Err(NetError::BadValue);
        }
        Ok(size)
    }
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_defaults_match_published_constants() -> TestResult {
        let opts = SocketOptions::new();
        assert_eq_test!(opts.recv_buf_size, SocketOptions::RECV_BUF_DEFAULT);
        assert_eq_test!(opts.send_buf_size, SocketOptions::SEND_BUF_DEFAULT);
        pass!()
    }

    pub fn test_set_recv_buf_size_rejects_out_of_range() -> TestResult {
        let mut opts = SocketOptions::new();
        assert_test!(opts.set_recv_buf_size(16).is_err());
        assert_test!(opts.set_recv_buf_size(1 << 30).is_err());
        assert_test!(opts.set_recv_buf_size(4096).is_ok());
        assert_eq_test!(opts.recv_buf_size, 4096);
        pass!()
    }

    netstack_support::define_test_suite!(
        socket_options,
        [test_defaults_match_published_constants, test_set_recv_buf_size_rejects_out_of_range]
    );
}
