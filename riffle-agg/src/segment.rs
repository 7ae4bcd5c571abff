use riffle_base::Result;
use riffle_vec::{Column, DataTy, ValueBuffer};

/// Rows a group may hold before leaving the linked tier.
pub(crate) const LINKED_CAPACITY: usize = 16;

/// Rows per linked segment.
const SEGMENT_ROWS: usize = 4;

struct Segment {
    vals: ValueBuffer,
    next: Option<Box<Segment>>,
}

impl Segment {
    fn new(ty: &DataTy) -> Segment {
        Segment {
            vals: ty.new_buffer(),
            next: None,
        }
    }

    fn append(&mut self, ty: &DataTy, col: &Column, row: usize) -> Result<()> {
        if self.vals.len() < SEGMENT_ROWS && self.next.is_none() {
            return col.append_row_to(row, &mut self.vals);
        }
        match self.next {
            Some(ref mut next) => next.append(ty, col, row),
            None => {
                let mut seg = Box::new(Segment::new(ty));
                col.append_row_to(row, &mut seg.vals)?;
                self.next = Some(seg);
                Ok(())
            }
        }
    }

    fn last_mut(&mut self) -> &mut Segment {
        match self.next {
            Some(ref mut next) => next.last_mut(),
            None => self,
        }
    }
}

/// Append-only singly linked column buffer for tiny groups.
pub(crate) struct LinkedCol {
    ty: DataTy,
    head: Option<Box<Segment>>,
    rows: usize,
}

impl LinkedCol {
    pub fn new(ty: DataTy) -> LinkedCol {
        LinkedCol {
            ty,
            head: None,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn append_row(&mut self, col: &Column, row: usize) -> Result<()> {
        match self.head {
            Some(ref mut seg) => seg.append(&self.ty, col, row)?,
            None => {
                let mut seg = Box::new(Segment::new(&self.ty));
                col.append_row_to(row, &mut seg.vals)?;
                self.head = Some(seg);
            }
        }
        self.rows += 1;
        Ok(())
    }

    /// Splice another chain onto this one's tail.
    pub fn absorb(&mut self, other: LinkedCol) {
        self.rows += other.rows;
        let Some(other_head) = other.head else {
            return;
        };
        match &mut self.head {
            None => self.head = Some(other_head),
            Some(head) => head.last_mut().next = Some(other_head),
        }
    }

    /// Copy every buffered row into a flat buffer, in append order.
    pub fn flush_into(&self, dst: &mut ValueBuffer) -> Result<()> {
        let mut cur = self.head.as_deref();
        while let Some(seg) = cur {
            for i in 0..seg.vals.len() {
                dst.append_row_from(&seg.vals, i)?;
            }
            cur = seg.next.as_deref();
        }
        Ok(())
    }
}
