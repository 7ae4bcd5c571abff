use crate::buffer::{DataTy, ValueBuffer};
use crate::column::Column;
use crate::VECTOR_SIZE;
use riffle_base::{err_input, err_internal, Result};

/// A horizontally aligned set of columns sharing one row count; the unit
/// of execution. Allocated once per pipeline stage and cleared, not freed,
/// between batches.
#[derive(Clone, Debug)]
pub struct Chunk {
    types: Vec<DataTy>,
    cols: Vec<Column>,
    rows: usize,
}

impl Chunk {
    pub fn new(types: &[DataTy]) -> Chunk {
        let cols = types.iter().map(|t| Column::Flat(t.new_buffer())).collect();
        Chunk {
            types: types.to_vec(),
            cols,
            rows: 0,
        }
    }

    /// Wrap prebuilt columns; the row count is the caller's claim and is
    /// checked by `verify`.
    pub fn from_columns(cols: Vec<Column>, rows: usize) -> Result<Chunk> {
        if rows > VECTOR_SIZE {
            return Err(err_input("chunk exceeds vector size"));
        }
        let types = cols.iter().map(|c| c.data_ty()).collect();
        Ok(Chunk { types, cols, rows })
    }

    pub fn types(&self) -> &[DataTy] {
        &self.types
    }

    pub fn width(&self) -> usize {
        self.cols.len()
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn set_rows(&mut self, rows: usize) {
        debug_assert!(rows <= VECTOR_SIZE);
        self.rows = rows;
    }

    pub fn col(&self, i: usize) -> &Column {
        &self.cols[i]
    }

    pub fn col_mut(&mut self, i: usize) -> &mut Column {
        &mut self.cols[i]
    }

    pub fn cols(&self) -> &[Column] {
        &self.cols
    }

    pub fn replace_col(&mut self, i: usize, col: Column) {
        self.types[i] = col.data_ty();
        self.cols[i] = col;
    }

    /// Flat buffer of column `i`; errors on any other layout.
    pub fn flat(&self, i: usize) -> Result<&ValueBuffer> {
        match &self.cols[i] {
            Column::Flat(buf) => Ok(buf),
            _ => Err(err_internal("expected flat column")),
        }
    }

    pub fn flat_mut(&mut self, i: usize) -> Result<&mut ValueBuffer> {
        match &mut self.cols[i] {
            Column::Flat(buf) => Ok(buf),
            _ => Err(err_internal("expected flat column")),
        }
    }

    /// Drop all rows; flat columns keep their allocations, other layouts
    /// revert to empty flat buffers of the declared type.
    pub fn clear(&mut self) {
        for (col, ty) in self.cols.iter_mut().zip(self.types.iter()) {
            match col {
                Column::Flat(buf) => buf.clear(),
                _ => *col = Column::Flat(ty.new_buffer()),
            }
        }
        self.rows = 0;
    }

    /// Gather `sel` rows of `src` onto the end of this chunk.
    pub fn append_sel(&mut self, src: &Chunk, sel: &[u32]) -> Result<()> {
        if self.width() != src.width() {
            return Err(err_internal("chunk widths disagree"));
        }
        for (i, col) in src.cols.iter().enumerate() {
            let dst = self.flat_mut(i)?;
            for &row in sel {
                col.append_row_to(row as usize, dst)?;
            }
        }
        self.rows += sel.len();
        if self.rows > VECTOR_SIZE {
            return Err(err_input("chunk exceeds vector size"));
        }
        Ok(())
    }

    /// Append every row of `src`.
    pub fn append_chunk(&mut self, src: &Chunk) -> Result<()> {
        if self.width() != src.width() {
            return Err(err_internal("chunk widths disagree"));
        }
        for (i, col) in src.cols.iter().enumerate() {
            let dst = self.flat_mut(i)?;
            for row in 0..src.rows() {
                col.append_row_to(row, dst)?;
            }
        }
        self.rows += src.rows();
        Ok(())
    }

    /// Structural invariants: a single cardinality, per-column checks.
    pub fn verify(&self) -> Result<()> {
        for col in &self.cols {
            col.verify(self.rows)?;
        }
        Ok(())
    }
}
