//! Scatter-gather packet buffer: a chain of [`DataNode`]s that can be cloned,
//! split and merged without copying the underlying bytes.
//!
//! This is the buffer every other layer of the stack passes around. A
//! buffer is never empty of nodes while it holds data — the chain always
//! has at least one node, even if that node's length is zero right after a
//! header is fully consumed by [`NetBuffer::pull_header`].

use alloc::vec::Vec;

use super::ancillary::AncillaryData;
use super::node::DataNode;
use crate::types::{Endpoint, Ipv4Addr};

pub struct NetBuffer {
    nodes: Vec<DataNode>,
    total_len: u32,
    l2_offset: Option<u32>,
    l3_offset: Option<u32>,
    l4_offset: Option<u32>,
    pub ancillary: AncillaryData,
    source: Option<Endpoint>,
    destination: Option<Endpoint>,
    interface_address: Option<Ipv4Addr>,
    stored_header: Vec<u8>,
}

impl NetBuffer {
    /// Allocate an empty buffer with headroom reserved for prepending
    /// headers, and no payload yet.
    pub fn alloc() -> Result<Self, ()> {
        let node = DataNode::new_empty()?;
        Ok(Self {
            nodes: alloc::vec![node],
            total_len: 0,
            l2_offset: None,
            l3_offset: None,
            l4_offset: None,
            ancillary: AncillaryData::new(),
            source: None,
            destination: None,
            interface_address: None,
            stored_header: Vec::new(),
        })
    }

    /// Build a buffer from a raw byte slice, copying it in, spilling into
    /// additional nodes if it doesn't fit in one page's tailroom.
    pub fn from_copy(data: &[u8]) -> Result<Self, ()> {
        let mut buf = Self::alloc()?;
        buf.append(data)?;
        Ok(buf)
    }

    pub fn len(&self) -> u32 {
        self.total_len
    }

    pub fn is_empty(&self) -> bool {
        self.total_len == 0
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Reserve `len` additional bytes at the front of the buffer and return
    /// them as a contiguous slice, e.g. to write a link-layer header before
    /// transmit. Fails if the first node lacks headroom — callers that
    /// might hit this should allocate with enough headroom up front.
    pub fn push_header(&mut self, len: u16) -> Result<&mut [u8], ()> {
        let first = self.nodes.first_mut().ok_or(())?;
        let slice = first.grow_front(len)?;
        self.total_len += len as u32;
        self.l2_offset = self.l2_offset.map(|o| o + len as u32);
        self.l3_offset = self.l3_offset.map(|o| o + len as u32);
        self.l4_offset = self.l4_offset.map(|o| o + len as u32);
        Ok(slice)
    }

    /// Consume `len` bytes from the front of the buffer, e.g. to strip a
    /// parsed link-layer header on receive.
    pub fn pull_header(&mut self, len: u16) -> Result<(), ()> {
        if (len as u32) > self.total_len {
            return Err(());
        }
        let mut remaining = len;
        while remaining > 0 {
            let Some(first) = self.nodes.first_mut() else { return Err(()) };
            let take = remaining.min(first.len());
            first.shrink_front(take)?;
            remaining -= take;
            if first.len() == 0 && self.nodes.len() > 1 {
                self.nodes.remove(0);
            }
        }
        self.total_len -= len as u32;
        self.l2_offset = self.l2_offset.and_then(|o| o.checked_sub(len as u32));
        self.l3_offset = self.l3_offset.and_then(|o| o.checked_sub(len as u32));
        self.l4_offset = self.l4_offset.and_then(|o| o.checked_sub(len as u32));
        Ok(())
    }

    /// Append bytes to the end of the buffer, reusing tailroom in the last
    /// node and allocating further nodes as needed.
    pub fn append(&mut self, mut src: &[u8]) -> Result<(), ()> {
        if let Some(last) = self.nodes.last_mut() {
            let room = last.tailroom().min(src.len() as u16);
            if room > 0 {
                let dst = last.grow_back(room)?;
                dst.copy_from_slice(&src[..room as usize]);
                self.total_len += room as u32;
                src = &src[room as usize..];
            }
        }
        while !src.is_empty() {
            let mut node = DataNode::new_empty()?;
            let take = src.len().min(node.tailroom() as usize) as u16;
            let dst = node.grow_back(take)?;
            dst.copy_from_slice(&src[..take as usize]);
            self.total_len += take as u32;
            self.nodes.push(node);
            src = &src[take as usize..];
        }
        Ok(())
    }

    /// Copy the whole buffer's payload into `out`, returning the number of
    /// bytes written (capped at `out.len()`).
    pub fn copy_to_slice(&self, out: &mut [u8]) -> usize {
        let mut written = 0;
        for node in &self.nodes {
            if written >= out.len() {
                break;
            }
            let data = node.data();
            let take = data.len().min(out.len() - written);
            out[written..written + take].copy_from_slice(&data[..take]);
            written += take;
        }
        written
    }

    pub fn iter_chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.nodes.iter().map(|n| n.data())
    }

    pub fn set_l2_offset(&mut self, offset: u32) {
        self.l2_offset = Some(offset);
    }
    pub fn set_l3_offset(&mut self, offset: u32) {
        self.l3_offset = Some(offset);
    }
    pub fn set_l4_offset(&mut self, offset: u32) {
        self.l4_offset = Some(offset);
    }
    pub fn l2_offset(&self) -> Option<u32> {
        self.l2_offset
    }
    pub fn l3_offset(&self) -> Option<u32> {
        self.l3_offset
    }
    pub fn l4_offset(&self) -> Option<u32> {
        self.l4_offset
    }

    /// Cheap clone: every node's page is refcounted, not copied. Mutating a
    /// header on either copy triggers copy-on-write in [`DataNode`].
    pub fn duplicate(&self) -> Self {
        Self {
            nodes: self.nodes.iter().map(DataNode::clone).collect(),
            total_len: self.total_len,
            l2_offset: self.l2_offset,
            l3_offset: self.l3_offset,
            l4_offset: self.l4_offset,
            ancillary: self.ancillary.clone(),
            source: self.source,
            destination: self.destination,
            interface_address: self.interface_address,
            stored_header: self.stored_header.clone(),
        }
    }

    /// Clone the buffer, optionally reserving each node's free space for the
    /// original rather than letting both copies grow into it. Use this
    /// instead of [`Self::duplicate`] when the original still intends to
    /// prepend or append after handing a copy downstream — without
    /// `share_free_space`, both copies would be free to grow into the same
    /// physical headroom/tailroom and silently race.
    pub fn clone(&self, share_free_space: bool) -> Self {
        let nodes: Vec<DataNode> = self
            .nodes
            .iter()
            .map(|n| {
                let mut cloned = n.clone();
                if share_free_space {
                    cloned.mark_read_only();
                }
                cloned
            })
            .collect();
        Self {
            nodes,
            total_len: self.total_len,
            l2_offset: self.l2_offset,
            l3_offset: self.l3_offset,
            l4_offset: self.l4_offset,
            ancillary: self.ancillary.clone(),
            source: self.source,
            destination: self.destination,
            interface_address: self.interface_address,
            stored_header: self.stored_header.clone(),
        }
    }

    /// Split the buffer into `(before, after)` at byte offset `at`, sharing
    /// pages with the original rather than copying.
    pub fn split_at(&self, at: u32) -> (Self, Self) {
        debug_assert!(at <= self.total_len);
        let mut before = Vec::new();
        let mut after = Vec::new();
        let mut consumed: u32 = 0;

        for node in &self.nodes {
            let node_len = node.len() as u32;
            if consumed + node_len <= at {
                before.push(node.clone());
            } else if consumed >= at {
                after.push(node.clone());
            } else {
                let split_point = (at - consumed) as u16;
                let (left, right) = node.split_off(split_point);
                before.push(left);
                after.push(right);
            }
            consumed += node_len;
        }

        let before_len = at;
        let after_len = self.total_len - at;
        (
            Self {
                nodes: before,
                total_len: before_len,
                l2_offset: self.l2_offset.filter(|&o| o <= before_len),
                l3_offset: self.l3_offset.filter(|&o| o <= before_len),
                l4_offset: self.l4_offset.filter(|&o| o <= before_len),
                ancillary: self.ancillary.clone(),
                source: self.source,
                destination: self.destination,
                interface_address: self.interface_address,
                stored_header: self.stored_header.clone(),
            },
            Self {
                nodes: after,
                total_len: after_len,
                l2_offset: None,
                l3_offset: None,
                l4_offset: None,
                ancillary: AncillaryData::new(),
                source: self.source,
                destination: self.destination,
                interface_address: self.interface_address,
                stored_header: Vec::new(),
            },
        )
    }

    /// Append another buffer's nodes onto the end of this one, consuming it.
    pub fn merge(&mut self, mut other: Self) {
        self.total_len += other.total_len;
        self.nodes.append(&mut other.nodes);
    }

    // -- addressing ----------------------------------------------------

    pub fn source(&self) -> Option<Endpoint> {
        self.source
    }

    pub fn set_source(&mut self, endpoint: Endpoint) {
        self.source = Some(endpoint);
    }

    pub fn destination(&self) -> Option<Endpoint> {
        self.destination
    }

    pub fn set_destination(&mut self, endpoint: Endpoint) {
        self.destination = Some(endpoint);
    }

    pub fn interface_address(&self) -> Option<Ipv4Addr> {
        self.interface_address
    }

    pub fn set_interface_address(&mut self, addr: Ipv4Addr) {
        self.interface_address = Some(addr);
    }

    /// Swap source and destination, e.g. when turning a received datagram
    /// into the skeleton of a reply.
    pub fn swap_addresses(&mut self) {
        core::mem::swap(&mut self.source, &mut self.destination);
    }

    // -- random access ---------------------------------------------------

    /// Copy `buf.len()` bytes starting at `offset` out of the buffer,
    /// without disturbing its contents. Fails if the range runs past the
    /// end of the buffer.
    pub fn read_data(&self, offset: u32, buf: &mut [u8]) -> Result<(), ()> {
        let end = offset.checked_add(buf.len() as u32).ok_or(())?;
        if end > self.total_len {
            return Err(());
        }
        let mut consumed = 0u32;
        let mut written = 0usize;
        for node in &self.nodes {
            let node_len = node.len() as u32;
            let node_start = consumed;
            let node_end = consumed + node_len;
            consumed = node_end;
            if node_end <= offset || node_start >= end {
                continue;
            }
            let data = node.data();
            let local_start = offset.saturating_sub(node_start) as usize;
            let local_end = (end.min(node_end) - node_start) as usize;
            let take = local_end - local_start;
            buf[written..written + take].copy_from_slice(&data[local_start..local_end]);
            written += take;
        }
        Ok(())
    }

    /// Overwrite `data.len()` bytes starting at `offset` with `data`,
    /// triggering copy-on-write on any node whose page is shared. Fails if
    /// the range runs past the end of the buffer.
    pub fn write_data(&mut self, offset: u32, data: &[u8]) -> Result<(), ()> {
        let end = offset.checked_add(data.len() as u32).ok_or(())?;
        if end > self.total_len {
            return Err(());
        }
        let mut consumed = 0u32;
        let mut read = 0usize;
        for node in &mut self.nodes {
            let node_len = node.len() as u32;
            let node_start = consumed;
            let node_end = consumed + node_len;
            consumed = node_end;
            if node_end <= offset || node_start >= end {
                continue;
            }
            let local_start = offset.saturating_sub(node_start) as usize;
            let local_end = (end.min(node_end) - node_start) as usize;
            let take = local_end - local_start;
            let slice = node.data_mut()?;
            slice[local_start..local_end].copy_from_slice(&data[read..read + take]);
            read += take;
        }
        Ok(())
    }

    /// Prepend bytes at the very front of the buffer, growing into headroom
    /// when available and falling back to a fresh node otherwise.
    pub fn prepend_data(&mut self, data: &[u8]) -> Result<(), ()> {
        let first = self.nodes.first_mut().ok_or(())?;
        if data.len() as u16 <= first.headroom() {
            let slice = self.push_header(data.len() as u16)?;
            slice.copy_from_slice(data);
            return Ok(());
        }
        let mut node = DataNode::new_empty()?;
        let headroom = node.headroom();
        if data.len() as u16 > headroom {
            return Err(());
        }
        let slice = node.grow_front(data.len() as u16)?;
        slice.copy_from_slice(data);
        let added = node.len() as u32;
        self.nodes.insert(0, node);
        self.total_len += added;
        self.l2_offset = self.l2_offset.map(|o| o + added);
        self.l3_offset = self.l3_offset.map(|o| o + added);
        self.l4_offset = self.l4_offset.map(|o| o + added);
        Ok(())
    }

    /// Append bytes at the very end of the buffer. Alias for [`Self::append`]
    /// under the name protocol code reaches for when pairing it with
    /// [`Self::prepend_data`].
    pub fn append_data(&mut self, data: &[u8]) -> Result<(), ()> {
        self.append(data)
    }

    /// Strip `len` bytes from the front. Alias for [`Self::pull_header`].
    pub fn remove_header(&mut self, len: u16) -> Result<(), ()> {
        self.pull_header(len)
    }

    /// Strip `len` bytes from the back, e.g. dropping a trailer that turned
    /// out not to belong to this buffer.
    pub fn remove_trailer(&mut self, len: u16) -> Result<(), ()> {
        self.trim(self.total_len.saturating_sub(len as u32))
    }

    /// Shrink the buffer to `new_len` bytes by dropping data from the back,
    /// removing now-empty trailing nodes.
    pub fn trim(&mut self, new_len: u32) -> Result<(), ()> {
        if new_len > self.total_len {
            return Err(());
        }
        let mut remaining = self.total_len - new_len;
        while remaining > 0 {
            let Some(last) = self.nodes.last_mut() else { return Err(()) };
            let take = remaining.min(last.len() as u32) as u16;
            last.shrink_back(take)?;
            remaining -= take as u32;
            if last.len() == 0 && self.nodes.len() > 1 {
                self.nodes.pop();
            }
        }
        self.total_len = new_len;
        Ok(())
    }

    /// Pull `len` bytes off the front and stash them, so they can be put
    /// back later with [`Self::restore_header`] — used when a header needs
    /// to be inspected and temporarily removed before the rest of a layer's
    /// processing runs.
    pub fn store_header(&mut self, len: u16) -> Result<(), ()> {
        let mut saved = alloc::vec![0u8; len as usize];
        self.read_data(0, &mut saved)?;
        self.pull_header(len)?;
        self.stored_header = saved;
        Ok(())
    }

    pub fn stored_header_length(&self) -> u16 {
        self.stored_header.len() as u16
    }

    /// Put back a header previously removed with [`Self::store_header`].
    pub fn restore_header(&mut self) -> Result<(), ()> {
        let saved = core::mem::take(&mut self.stored_header);
        if saved.is_empty() {
            return Ok(());
        }
        self.prepend_data(&saved)
    }

    /// Prepend this buffer's stored header onto `dst`, without consuming
    /// this buffer's own copy — used to stamp a header saved off one buffer
    /// onto a reply or a cloned copy routed elsewhere.
    pub fn append_restored_header(&self, dst: &mut NetBuffer) -> Result<(), ()> {
        if self.stored_header.is_empty() {
            return Ok(());
        }
        dst.prepend_data(&self.stored_header)
    }

    /// Borrow a contiguous, mutable slice of the buffer in place, without
    /// copying. Only succeeds when `[offset, offset + len)` falls entirely
    /// within a single node; callers that can't guarantee that should use
    /// [`Self::read_data`]/[`Self::write_data`] instead.
    pub fn direct_access(&mut self, offset: u32, len: u32) -> Result<&mut [u8], ()> {
        let mut consumed = 0u32;
        for node in &mut self.nodes {
            let node_len = node.len() as u32;
            if offset == consumed {
                if len > node_len {
                    return Err(());
                }
                let data = node.data_mut()?;
                return Ok(&mut data[..len as usize]);
            }
            consumed += node_len;
        }
        Err(())
    }

    /// Append a zero-copy view of `[offset, offset + len)` of `src` onto
    /// this buffer, sharing pages rather than copying bytes.
    pub fn append_cloned_data(&mut self, src: &NetBuffer, offset: u32, len: u32) -> Result<(), ()> {
        let end = offset.checked_add(len).ok_or(())?;
        if end > src.total_len {
            return Err(());
        }
        let (_, tail) = src.split_at(offset);
        let (middle, _) = tail.split_at(len);
        self.merge(middle);
        Ok(())
    }

    /// The buffer's nodes as a list of scatter-gather segments, suitable
    /// for handing to a driver's transmit path or an `iovec`-style API.
    pub fn get_iovecs(&self) -> Vec<&[u8]> {
        self.nodes.iter().map(|n| n.data()).collect()
    }

    pub fn count_iovecs(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netstack_support::testing::TestResult;
    use netstack_support::{assert_eq_test, assert_test, pass};

    pub fn test_read_data_matches_written_bytes() -> TestResult {
        let payload = b"hello, network stack";
        let buf = NetBuffer::from_copy(payload).unwrap();
        let mut out = alloc::vec![0u8; payload.len()];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out[..], &payload[..]);
        assert_eq_test!(buf.count_iovecs(), 1);
        pass!()
    }

    pub fn test_read_data_past_end_fails() -> TestResult {
        let buf = NetBuffer::from_copy(b"short").unwrap();
        assert_test!(buf.read_data(3, &mut [0u8; 10]).is_err());
        pass!()
    }

    pub fn test_write_data_triggers_cow_on_shared_page() -> TestResult {
        let mut original = NetBuffer::from_copy(b"original").unwrap();
        let mut shared = original.duplicate();
        shared.write_data(0, b"changed!").unwrap();
        let mut out = [0u8; 8];
        original.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"original");
        pass!()
    }

    pub fn test_prepend_then_remove_header_round_trips() -> TestResult {
        let mut buf = NetBuffer::from_copy(b"payload").unwrap();
        buf.prepend_data(b"HDR").unwrap();
        assert_eq_test!(buf.len(), 10);
        let mut out = [0u8; 3];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"HDR");
        buf.remove_header(3).unwrap();
        assert_eq_test!(buf.len(), 7);
        let mut out = [0u8; 7];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"payload");
        pass!()
    }

    pub fn test_append_then_remove_trailer_round_trips() -> TestResult {
        let mut buf = NetBuffer::from_copy(b"payload").unwrap();
        buf.append_data(b"TRAILER").unwrap();
        assert_eq_test!(buf.len(), 14);
        buf.remove_trailer(7).unwrap();
        assert_eq_test!(buf.len(), 7);
        let mut out = [0u8; 7];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"payload");
        pass!()
    }

    pub fn test_store_and_restore_header() -> TestResult {
        let mut buf = NetBuffer::from_copy(b"HDRpayload").unwrap();
        buf.store_header(3).unwrap();
        assert_eq_test!(buf.stored_header_length(), 3);
        assert_eq_test!(buf.len(), 7);
        buf.restore_header().unwrap();
        assert_eq_test!(buf.len(), 10);
        let mut out = [0u8; 3];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"HDR");
        pass!()
    }

    pub fn test_large_payload_spans_two_iovecs_and_checksums() -> TestResult {
        let payload: alloc::vec::Vec<u8> = (0..3000u32).map(|i| (i % 251) as u8).collect();
        let buf = NetBuffer::from_copy(&payload).unwrap();
        assert_eq_test!(buf.count_iovecs(), 2);
        let _ = super::super::checksum::checksum_data(&buf, 0, 3000, true);
        let mut out = alloc::vec![0u8; 3000];
        buf.read_data(0, &mut out).unwrap();
        assert_eq_test!(out, payload);
        pass!()
    }

    pub fn test_swap_addresses_exchanges_source_and_destination() -> TestResult {
        use crate::types::{Endpoint, Ipv4Addr, Port};
        let mut buf = NetBuffer::alloc().unwrap();
        let a = Endpoint::new(Ipv4Addr::from_octets([10, 0, 0, 1]), Port::new(1111));
        let b = Endpoint::new(Ipv4Addr::from_octets([10, 0, 0, 2]), Port::new(2222));
        buf.set_source(a);
        buf.set_destination(b);
        buf.swap_addresses();
        assert_eq_test!(buf.source().unwrap(), b);
        assert_eq_test!(buf.destination().unwrap(), a);
        pass!()
    }

    pub fn test_clone_share_free_space_forbids_growth() -> TestResult {
        let mut buf = NetBuffer::from_copy(b"payload").unwrap();
        let shared = buf.clone(true);
        assert_eq_test!(shared.len(), 7);
        assert_test!(buf.prepend_data(b"HDR").is_ok());
        pass!()
    }

    pub fn test_append_cloned_data_shares_source_bytes() -> TestResult {
        let src = NetBuffer::from_copy(b"0123456789").unwrap();
        let mut dst = NetBuffer::alloc().unwrap();
        dst.append_cloned_data(&src, 2, 5).unwrap();
        let mut out = [0u8; 5];
        dst.read_data(0, &mut out).unwrap();
        assert_eq_test!(&out, b"23456");
        pass!()
    }

    netstack_support::define_test_suite!(
        netbuf_ops,
        [
            test_read_data_matches_written_bytes,
            test_read_data_past_end_fails,
            test_write_data_triggers_cow_on_shared_page,
            test_prepend_then_remove_header_round_trips,
            test_append_then_remove_trailer_round_trips,
            test_store_and_restore_header,
            test_large_payload_spans_two_iovecs_and_checksums,
            test_swap_addresses_exchanges_source_and_destination,
            test_clone_share_free_space_forbids_growth,
            test_append_cloned_data_shares_source_bytes,
        ]
    );
}
