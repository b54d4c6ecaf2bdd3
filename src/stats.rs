//! Human-readable chain-length report, for debugging and INFO-style output.

use crate::dict::Dict;
use crate::dict_type::DictType;
use crate::table::BucketTable;
use core::fmt::Write;

/// Chain lengths at or above this are counted in the last histogram row.
const STATS_VECTLEN: usize = 50;

impl<T: DictType> Dict<T> {
    /// Render the report into `buf`, replacing its contents, and truncate it
    /// to at most `bufsize` bytes. Table 1 is included only while rehashing.
    pub fn get_stats(&self, buf: &mut String, bufsize: usize) {
        buf.clear();
        self.table_stats(buf, &self.ht[0], 0);
        if self.is_rehashing() && buf.len() < bufsize {
            self.table_stats(buf, &self.ht[1], 1);
        }
        if buf.len() > bufsize {
            let mut end = bufsize;
            while !buf.is_char_boundary(end) {
                end -= 1;
            }
            buf.truncate(end);
        }
    }

    fn table_stats(&self, buf: &mut String, ht: &BucketTable, table_id: usize) {
        if ht.used == 0 {
            buf.push_str("No stats available for empty dictionaries\n");
            return;
        }

        let mut clvector = [0usize; STATS_VECTLEN];
        let mut slots = 0;
        let mut max_chain = 0;
        let mut total_chain = 0;
        for &head in &ht.table {
            if head.is_none() {
                clvector[0] += 1;
                continue;
            }
            slots += 1;
            let len = self.chain(head).count();
            clvector[len.min(STATS_VECTLEN - 1)] += 1;
            max_chain = max_chain.max(len);
            total_chain += len;
        }

        // Writing to a String cannot fail.
        let _ = write!(
            buf,
            "Hash table {} stats ({}):\n \
             table size: {}\n \
             number of elements: {}\n \
             different slots: {}\n \
             max chain length: {}\n \
             avg chain length (counted): {:.2}\n \
             avg chain length (computed): {:.2}\n \
             Chain length distribution:\n",
            table_id,
            if table_id == 0 {
                "main hash table"
            } else {
                "rehashing target"
            },
            ht.size,
            ht.used,
            slots,
            max_chain,
            total_chain as f64 / slots as f64,
            ht.used as f64 / slots as f64,
        );
        for (len, &count) in clvector.iter().enumerate() {
            if count == 0 {
                continue;
            }
            let _ = writeln!(
                buf,
                "   {}{}: {} ({:.2}%)",
                if len == STATS_VECTLEN - 1 { ">= " } else { "" },
                len,
                count,
                count as f64 / ht.size as f64 * 100.0,
            );
        }
    }
}
